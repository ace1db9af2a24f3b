use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("sdp: empty session description")]
    SdpEmpty,
    #[error("sdp: invalid syntax `{0}`")]
    SdpInvalidSyntax(String),
    #[error("sdp: invalid value `{0}`")]
    SdpInvalidValue(String),
    #[error("sdp: codec not found")]
    CodecNotFound,
    #[error("{0}")]
    Other(String),
}
