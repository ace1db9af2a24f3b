use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("buffer too small to fit header")]
    ErrUnexpectedHeaderEof,
    #[error("unexpected end of buffer")]
    ErrUnexpectedEof,
    #[error("attribute size is invalid")]
    ErrAttributeSizeInvalid,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("{0:x} is invalid magic cookie (should be 2112a442)")]
    ErrInvalidMagicCookie(u32),
    #[error("fingerprint check failed")]
    ErrFingerprintMismatch,
    #[error("fingerprint must be last attribute, can not add integrity after it")]
    ErrFingerprintBeforeIntegrity,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("invalid error code value")]
    ErrInvalidErrorCode,
    #[error("invalid url")]
    ErrInvalidUrl,
    #[error("unknown uri scheme")]
    ErrSchemeType,
    #[error("queries not supported in stun address")]
    ErrStunQuery,
    #[error("invalid transport protocol type")]
    ErrProtoType,
    #[error("invalid hostname")]
    ErrHost,
    #[error("invalid port number")]
    ErrPort,

    #[error("{0}")]
    Other(String),
}
