use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer too short to be a valid RTCP packet")]
    PacketTooShort,
    #[error("buffer too short to marshal into")]
    BufferTooShort,
    #[error("header has an invalid version")]
    BadVersion,
    #[error("wrong packet type")]
    WrongType,
    #[error("SDES must be terminated by a null item")]
    PacketMissingNullTermination,
    #[error("SDES item value is too long")]
    SdesTextTooLong,
    #[error("BYE reason is too long")]
    ReasonTooLong,
    #[error("header count is out of range")]
    InvalidHeader,
    #[error("too many reception reports")]
    TooManyReports,
    #[error("invalid packet status chunk type")]
    WrongChunkType,
    #[error("packet status symbol is invalid")]
    WrongTypeTcc,
    #[error("invalid run length chunk size")]
    WrongRunLengthChunkSize,
    #[error("invalid status vector chunk size")]
    WrongStatusVectorChunkSize,
    #[error("recv delta out of range for its symbol")]
    DeltaExceedLimit,
    #[error("packet status count mismatch")]
    PacketStatusChunkLength,
    #[error("unknown extended report block type")]
    UnknownBlockType,
    #[error("extended report block length mismatch")]
    WrongBlockSize,

    #[error("{0}")]
    Other(String),
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}
