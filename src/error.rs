use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt data: {0}")]
    Corrupt(String),
    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("index file not found: {}", .0.display())]
    IndexNotFound(PathBuf),
    #[error("index holds no access points")]
    EmptyIndex,
    #[error("index has no resident windows")]
    WindowsNotResident,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Maps an unexpected EOF on a side file or the compressed stream to
    /// `Corrupt`; every other I/O error stays `Io`.
    pub(crate) fn from_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Corrupt(format!("{what} truncated"))
        } else {
            Error::Io(err)
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        use std::io::ErrorKind;
        match value {
            Error::Io(err) => err,
            Error::Unsupported(_) => std::io::Error::new(ErrorKind::Unsupported, value),
            Error::OutOfMemory(_) => std::io::Error::new(ErrorKind::OutOfMemory, value),
            Error::IndexNotFound(_) => std::io::Error::new(ErrorKind::NotFound, value),
            Error::InvalidArgument(_) => std::io::Error::new(ErrorKind::InvalidInput, value),
            other => std::io::Error::new(ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
