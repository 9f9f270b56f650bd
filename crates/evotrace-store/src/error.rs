use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Database(rusqlite::Error),
    Io(std::io::Error),
    Domain(evotrace_types::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "database error: {}", err),
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Domain(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Domain(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<evotrace_types::Error> for Error {
    fn from(err: evotrace_types::Error) -> Self {
        Error::Domain(err)
    }
}

impl From<Error> for evotrace_types::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Domain(e) => e,
            Error::Database(e) => evotrace_types::Error::storage(e.to_string()),
            Error::Io(e) => evotrace_types::Error::storage(e.to_string()),
        }
    }
}

pub(crate) fn validation(msg: impl Into<String>) -> Error {
    Error::Domain(evotrace_types::Error::validation(msg))
}

pub(crate) fn not_found(msg: impl Into<String>) -> Error {
    Error::Domain(evotrace_types::Error::not_found(msg))
}
