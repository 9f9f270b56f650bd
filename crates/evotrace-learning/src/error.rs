use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Store(evotrace_store::Error),
    Domain(evotrace_types::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "{}", err),
            Error::Domain(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Domain(err) => Some(err),
        }
    }
}

impl From<evotrace_store::Error> for Error {
    fn from(err: evotrace_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<evotrace_types::Error> for Error {
    fn from(err: evotrace_types::Error) -> Self {
        Error::Domain(err)
    }
}

pub(crate) fn validation(msg: impl Into<String>) -> Error {
    Error::Domain(evotrace_types::Error::validation(msg))
}

pub(crate) fn state(msg: impl Into<String>) -> Error {
    Error::Domain(evotrace_types::Error::state(msg))
}
