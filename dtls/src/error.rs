use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer is too small")]
    ErrBufferTooSmall,
    #[error("unhandled content type")]
    ErrInvalidContentType,
    #[error("unhandled handshake type")]
    ErrInvalidHandshakeType,
    #[error("DTLS record has an unsupported version")]
    ErrUnsupportedProtocolVersion,
    #[error("handshake message is not complete")]
    ErrHandshakeMessageIncomplete,
    #[error("cipher suite has not been initialized")]
    ErrCipherSuiteNotInit,
    #[error("no shared cipher suite")]
    ErrCipherSuiteNoIntersection,
    #[error("client did not offer a supported elliptic curve")]
    ErrNoSupportedEllipticCurves,
    #[error("no srtp protection profile in common")]
    ErrServerNoMatchingSrtpProfile,
    #[error("failed to verify the finished message")]
    ErrVerifyDataMismatch,
    #[error("peer certificate chain is empty")]
    ErrNoCertificates,
    #[error("certificate signature could not be verified")]
    ErrCertificateVerify,
    #[error("key exchange signature could not be verified")]
    ErrKeySignatureMismatch,
    #[error("handshake timed out waiting for the peer")]
    ErrDeadlineExceeded,
    #[error("the connection is closed")]
    ErrConnClosed,
    #[error("alert is fatal: {0}")]
    ErrAlertFatal(String),
    #[error("peer requested close_notify")]
    ErrAlertCloseNotify,
    #[error("keying material exporter called with a reserved label")]
    ErrReservedExportKeyingMaterial,
    #[error("keying material exporter is only available after the handshake")]
    ErrHandshakeInProgress,
    #[error("sequence number overflow: connection must be rekeyed")]
    ErrSequenceNumberOverflow,
    #[error("cookie mismatch in second ClientHello")]
    ErrCookieMismatch,

    #[error("{0}")]
    Crypto(String),

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
