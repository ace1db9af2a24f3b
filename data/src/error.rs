use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("data channel message is too short")]
    UnexpectedEndOfBuffer,
    #[error("unknown data channel message type")]
    InvalidMessageType(u8),
    #[error("unknown data channel channel type")]
    InvalidChannelType(u8),
    #[error("invalid payload protocol identifier")]
    InvalidPayloadProtocolIdentifier(u32),
    #[error("data channel label is not valid utf-8")]
    InvalidLabel,
    #[error("data channel is not opened")]
    ErrClosedDataChannel,

    #[error("{0}")]
    Sctp(#[from] sctp::Error),

    #[error("{0}")]
    Other(String),
}
