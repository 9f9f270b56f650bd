use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for SDK operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid input parameters (e.g. a weight map with a negative entry).
    InvalidInput(String),
    /// Error from the process-global tracker / configuration layer.
    Runtime(evotrace_runtime::Error),
    /// Error from the learning engine, optimizer, AB engine, or bootstrap loader.
    Learning(evotrace_learning::Error),
    /// Error from the in-process tracer itself (task/execution/span lifecycle).
    Engine(evotrace_engine::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::Runtime(err) => write!(f, "{err}"),
            Error::Learning(err) => write!(f, "{err}"),
            Error::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidInput(_) => None,
            Error::Runtime(err) => Some(err),
            Error::Learning(err) => Some(err),
            Error::Engine(err) => Some(err),
        }
    }
}

impl From<evotrace_runtime::Error> for Error {
    fn from(err: evotrace_runtime::Error) -> Self {
        Error::Runtime(err)
    }
}

impl From<evotrace_learning::Error> for Error {
    fn from(err: evotrace_learning::Error) -> Self {
        Error::Learning(err)
    }
}

impl From<evotrace_engine::Error> for Error {
    fn from(err: evotrace_engine::Error) -> Self {
        Error::Engine(err)
    }
}
