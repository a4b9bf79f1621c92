use thiserror::Error;

/// Core error type shared across schemasync crates.
///
/// Collaborators return these variants and the orchestrator hands them back
/// to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A request was rejected before reaching a backend.
    #[error("validation error: {0}")]
    Validation(String),
    /// A connection could not be reached or authenticated.
    #[error("connection failed: {0}")]
    Connectivity(String),
    /// One or more statements failed on the target.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The save dialog or the file write failed.
    #[error("export failed: {0}")]
    Export(String),
    /// A referenced connection or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by schemasync crates.
pub type Result<T> = std::result::Result<T, Error>;
