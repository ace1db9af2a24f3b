use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("the agent is closed")]
    ErrClosed,
    #[error("remote ufrag and pwd are not set")]
    ErrRemoteCredentials,
    #[error("local ufrag is shorter than 4 characters")]
    ErrLocalUfragInsufficientBits,
    #[error("local pwd is shorter than 22 characters")]
    ErrLocalPwdInsufficientBits,
    #[error("attribute not long enough to be an ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("could not parse component")]
    ErrParseComponent,
    #[error("could not parse priority")]
    ErrParsePriority,
    #[error("could not parse port")]
    ErrParsePort,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("no viable candidate pair, connection failed")]
    ErrNoViablePair,
    #[error("connecting timed out before a pair was nominated")]
    ErrConnectionTimeout,
    #[error("gathering produced no candidates")]
    ErrNoCandidates,
    #[error("role conflict could not be resolved")]
    ErrRoleConflict,

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
