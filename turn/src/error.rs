use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("all retransmissions failed")]
    ErrAllRetransmissionsFailed,
    #[error("only one allocation is supported per client")]
    ErrOneAllocateOnly,
    #[error("already allocated")]
    ErrAlreadyAllocated,
    #[error("no allocation exists yet")]
    ErrNoAllocation,
    #[error("server returned error: {0}")]
    ErrServerError(String),
    #[error("401 response is missing realm or nonce")]
    ErrMissingRealmOrNonce,
    #[error("channel data is too short")]
    ErrShortChannelData,
    #[error("channel number is out of the valid range")]
    ErrInvalidChannelNumber,
    #[error("transaction closed")]
    ErrTransactionClosed,
    #[error("fake transaction timed out")]
    ErrTimedOut,
    #[error("relay connection was closed")]
    ErrClosed,

    #[error("{0}")]
    Stun(String),

    #[error("{0}")]
    Util(String),

    #[error("{0}")]
    Other(String),
}

impl From<stun::Error> for Error {
    fn from(e: stun::Error) -> Self {
        Error::Stun(e.to_string())
    }
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Util(e.to_string())
    }
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}
