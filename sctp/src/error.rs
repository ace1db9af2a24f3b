use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("raw is too small for a SCTP chunk")]
    ErrChunkHeaderTooSmall,
    #[error("not enough data left in SCTP packet to satisfy requested length")]
    ErrChunkHeaderNotEnoughSpace,
    #[error("chunk PPI was 0, but is required by packet mapping")]
    ErrChunkHeaderPaddingNonZero,
    #[error("chunk has invalid length")]
    ErrChunkHeaderInvalidLength,
    #[error("raw is smaller than the minimum length for a SCTP packet")]
    ErrPacketRawTooSmall,
    #[error("checksum mismatch theirs")]
    ErrChecksumMismatch,
    #[error("chunk type is not of type init")]
    ErrChunkTypeNotTypeInit,
    #[error("chunk type is not cookie echo")]
    ErrChunkTypeNotCookieEcho,
    #[error("chunk value is not long enough for an init chunk")]
    ErrChunkValueNotLongEnough,
    #[error("chunk type is not sack")]
    ErrChunkTypeNotSack,
    #[error("SACK chunk size is not large enough")]
    ErrSackSizeNotLargeEnoughInfo,
    #[error("chunk type is not payload data")]
    ErrChunkTypeNotPayloadData,
    #[error("packet is smaller than the header size")]
    ErrParamHeaderTooShort,
    #[error("param self reported length is shorter than header length")]
    ErrParamHeaderSelfReportedLengthShorter,
    #[error("param self reported length is longer than actual length")]
    ErrParamHeaderSelfReportedLengthLonger,
    #[error("unhandled parameter type")]
    ErrParamTypeUnhandled,
    #[error("chunk type is not reconfig")]
    ErrChunkTypeNotReconfig,
    #[error("chunk type is not forward tsn")]
    ErrChunkTypeNotForwardTsn,
    #[error("heartbeat is not long enough to contain heartbeat info")]
    ErrHeartbeatNotLongEnoughInfo,
    #[error("association initialization failed: connection timed out")]
    ErrHandshakeInitAck,
    #[error("association handshake closed early")]
    ErrHandshakeClosedEarly,
    #[error("association closed before connecting")]
    ErrAssociationClosedBeforeConn,
    #[error("abort chunk received")]
    ErrAbortChunk(String),
    #[error("shutdown initiated")]
    ErrShutdownInitiated,
    #[error("stream already closed")]
    ErrStreamClosed,
    #[error("stream id already in use")]
    ErrStreamAlreadyExist,
    #[error("outbound packet larger than maximum message size")]
    ErrOutboundPacketTooLarge,
    #[error("timer expired before the association established")]
    ErrTimerExpired,
    #[error("received cookie echo with an invalid state cookie")]
    ErrCookieEchoInvalid,
    #[error("short buffer to read into")]
    ErrShortBuffer,
    #[error("eof")]
    ErrEof,

    #[error("{0}")]
    Util(String),

    #[error("{0}")]
    Other(String),
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Util(e.to_string())
    }
}
