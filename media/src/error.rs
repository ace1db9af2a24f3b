use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("jitter buffer latency must be non-zero")]
    ErrInvalidLatency,
    #[error("{0}")]
    Other(String),
}
