use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: full")]
    ErrBufferFull,
    #[error("buffer: closed")]
    ErrBufferClosed,
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("packet too big")]
    ErrPacketTooBig,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("underflow")]
    ErrUnderflow,
    #[error("connection closed")]
    ErrClosedListener,
    #[error("marshal output size {0}, but expected {1}")]
    ErrMarshalSizeMismatch(usize, usize),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Std(Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn new(msg: String) -> Self {
        Error::Other(msg)
    }

    // from_std wraps a foreign error, keeping it available for downcasts.
    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(Box::new(error))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        if let Error::Std(e) = self {
            return e.downcast_ref();
        }
        None
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
