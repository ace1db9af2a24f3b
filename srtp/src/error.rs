use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("SRTP master key is not long enough: expected {0}, got {1}")]
    SrtpMasterKeyLength(usize, usize),
    #[error("SRTP master salt is not long enough: expected {0}, got {1}")]
    SrtpSaltLength(usize, usize),
    #[error("duplicated packet")]
    DuplicatedPacket,
    #[error("failed to verify auth tag")]
    FailedToVerifyAuthTag,
    #[error("packet is too short to be an rtcp packet")]
    TooShortRtcp,
    #[error("packet is too short to be an rtp packet")]
    TooShortRtp,
    #[error("exporter called with wrong label or length")]
    ExporterFailed,
    #[error("no such SRTP profile negotiated")]
    UnsupportedProtectionProfile,
    #[error("index over kdr is not supported yet")]
    UnsupportedIndexOverKdr,

    #[error("{0}")]
    Rtp(String),

    #[error("{0}")]
    Other(String),
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Rtp(e.to_string())
    }
}
