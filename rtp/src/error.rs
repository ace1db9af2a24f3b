use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("RTP header size insufficient")]
    ErrHeaderSizeInsufficient,
    #[error("RTP header size insufficient for extension")]
    ErrHeaderSizeInsufficientForExtension,
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("extension not enabled")]
    ErrHeaderExtensionsNotEnabled,
    #[error("extension not found")]
    ErrHeaderExtensionNotFound,
    #[error("header extension id must be between 1 and 14 for RFC 5285 one byte extensions")]
    ErrRfc8285oneByteHeaderIdRange,
    #[error("header extension payload must be 16 bytes or less for RFC 5285 one byte extensions")]
    ErrRfc8285oneByteHeaderSize,
    #[error("header extension id must be between 1 and 255 for RFC 5285 two byte extensions")]
    ErrRfc8285twoByteHeaderIdRange,
    #[error("header extension payload must be 255 bytes or less for RFC 5285 two byte extensions")]
    ErrRfc8285twoByteHeaderSize,
    #[error("header extension id must be 0 for non-RFC 5285 extensions")]
    ErrRfc3550headerIdRange,
    #[error("payload is not large enough")]
    ErrShortPacket,
    #[error("packet is not large enough")]
    ErrTooSmall,
    #[error("NALU type is not handled")]
    ErrNaluTypeIsNotHandled,
    #[error("corrupted h264 packet")]
    ErrH264CorruptedPacket,
    #[error("invalid RTP padding")]
    ErrInvalidRtpPadding,
    #[error("vp8 payload is too small")]
    ErrVp8PayloadTooSmall,
    #[error("vp9 payload is too small")]
    ErrVp9PayloadTooSmall,
    #[error("vp9 corrupted packet")]
    ErrVp9CorruptedPacket,
    #[error("av1 payload is too small")]
    ErrAv1PayloadTooSmall,
    #[error("av1 corrupted OBU length")]
    ErrAv1CorruptedObu,
    #[error("opus payload is empty")]
    ErrOpusPayloadEmpty,
    #[error("red block length overruns payload")]
    ErrRedBlockOverrun,
    #[error("red header is truncated")]
    ErrRedHeaderTruncated,
    #[error("rtx payload is missing the original sequence number")]
    ErrRtxPayloadTooSmall,

    #[error("{0}")]
    Other(String),
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}
