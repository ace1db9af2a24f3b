use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid buffer size")]
    ErrInvalidSize,
    #[error("interceptor is closed")]
    ErrIoEof,
    #[error("packet source is gone")]
    ErrSourceClosed,

    #[error("{0}")]
    Rtcp(String),

    #[error("{0}")]
    Rtp(String),

    #[error("{0}")]
    Other(String),
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Other(e.to_string())
    }
}
