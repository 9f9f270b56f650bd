use std::fmt;

/// Result type for evotrace-types operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared by every evotrace crate.
///
/// Each downstream crate wraps this in its own `Error` enum via `From`,
/// the way `evotrace-store::Error` wraps `rusqlite::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed input: bad path, invalid sort column, oversized batch,
    /// non-finite reward, misaligned traffic split, schema mismatch, ...
    Validation(String),
    /// A requested task/execution/experiment/pattern/adaptation does not exist.
    NotFound(String),
    /// A lifecycle precondition was violated (e.g. starting an execution
    /// without an active task).
    State(String),
    /// Backing-store I/O or constraint failure.
    Storage(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::State(_) => "state",
            Error::Storage(_) => "storage",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "validation error: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::State(msg) => write!(f, "state error: {}", msg),
            Error::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(Error::validation("x").kind(), "validation");
        assert_eq!(Error::not_found("x").kind(), "not_found");
        assert_eq!(Error::state("x").kind(), "state");
        assert_eq!(Error::storage("x").kind(), "storage");
    }
}
