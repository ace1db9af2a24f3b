use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// The error taxonomy surfaced to callers; one variant family per layer.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    // Configuration
    #[error("invalid ICE server url: {0}")]
    ErrInvalidIceServer(String),
    #[error("no codec registered for this kind")]
    ErrCodecNotFound,
    #[error("unsupported SRTP protection profile")]
    ErrUnsupportedSrtpProfile,

    // Signalling
    #[error("SDP does not parse: {0}")]
    ErrSdpParse(String),
    #[error("invalid signaling state transition: {0}")]
    ErrInvalidStateTransition(String),
    #[error("remote certificate does not match any SDP fingerprint")]
    ErrFingerprintMismatch,
    #[error("remote description is missing ICE credentials")]
    ErrMissingIceCredentials,
    #[error("m-section count changed across rollback")]
    ErrMSectionCountMismatch,
    #[error("remote description was not set")]
    ErrNoRemoteDescription,

    // ICE
    #[error("ICE failed: no viable candidate pair")]
    ErrIceFailed,
    #[error("ICE restart required")]
    ErrIceRestart,

    // DTLS
    #[error("DTLS handshake failed: {0}")]
    ErrDtlsHandshake(String),

    // SCTP
    #[error("SCTP association failed: {0}")]
    ErrSctpFailed(String),

    // Data
    #[error("data channel is not open")]
    ErrDataChannelNotOpen,
    #[error("message exceeds max-message-size")]
    ErrDataChannelMessageTooLarge,

    // Lifecycle
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("operation timed out")]
    ErrTimeout,

    #[error("{0}")]
    Ice(String),
    #[error("{0}")]
    Dtls(String),
    #[error("{0}")]
    Srtp(String),
    #[error("{0}")]
    Sctp(String),
    #[error("{0}")]
    Data(String),
    #[error("{0}")]
    Rtp(String),
    #[error("{0}")]
    Rtcp(String),
    #[error("{0}")]
    Util(String),

    #[error("{0}")]
    Other(String),
}

impl From<ice::Error> for Error {
    fn from(e: ice::Error) -> Self {
        Error::Ice(e.to_string())
    }
}

impl From<dtls::Error> for Error {
    fn from(e: dtls::Error) -> Self {
        Error::Dtls(e.to_string())
    }
}

impl From<srtp::Error> for Error {
    fn from(e: srtp::Error) -> Self {
        Error::Srtp(e.to_string())
    }
}

impl From<sctp::Error> for Error {
    fn from(e: sctp::Error) -> Self {
        Error::Sctp(e.to_string())
    }
}

impl From<data::Error> for Error {
    fn from(e: data::Error) -> Self {
        Error::Data(e.to_string())
    }
}

impl From<sdp::Error> for Error {
    fn from(e: sdp::Error) -> Self {
        Error::ErrSdpParse(e.to_string())
    }
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        Error::Util(e.to_string())
    }
}

impl From<rtp::Error> for Error {
    fn from(e: rtp::Error) -> Self {
        Error::Rtp(e.to_string())
    }
}

impl From<interceptor::Error> for Error {
    fn from(e: interceptor::Error) -> Self {
        Error::Other(e.to_string())
    }
}
