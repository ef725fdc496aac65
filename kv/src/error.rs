use std::fmt::{Display, Formatter};

/// Result alias used throughout the engine, mirroring the storage crate's own `CResult`.
pub type CResult<T> = std::result::Result<T, Error>;

/// Engine-level errors. There is intentionally a single catch-all variant: every failure
/// this engine can produce (I/O on the log, a held lock, a malformed command argument)
/// is reported to the caller as `ERR <message>`, so callers never need to match on variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Internal(String),
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
