use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Store(evotrace_store::Error),
    Engine(evotrace_engine::Error),
    Learning(evotrace_learning::Error),
    Io(std::io::Error),
    Config(String),
    NotInitialized(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "store error: {err}"),
            Error::Engine(err) => write!(f, "engine error: {err}"),
            Error::Learning(err) => write!(f, "learning error: {err}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::NotInitialized(msg) => write!(f, "global tracker not initialized: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Learning(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Config(_) | Error::NotInitialized(_) => None,
        }
    }
}

impl From<evotrace_store::Error> for Error {
    fn from(err: evotrace_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<evotrace_engine::Error> for Error {
    fn from(err: evotrace_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<evotrace_learning::Error> for Error {
    fn from(err: evotrace_learning::Error) -> Self {
        Error::Learning(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
