//! Error types for the optimization engine
//!
//! Only structural problems (missing task, no test cases, no graders), bad
//! request parameters and fatal oracle failures surface as an `Error`.
//! Transient oracle failures, grader failures and generation failures are
//! recorded in the run log as missing values instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Optimization engine error types
#[derive(Error, Debug)]
pub enum Error {
    /// Task store has no task with this id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Task exists but has nothing to evaluate against
    #[error("Task {0} has no test cases configured\nAdd at least one test case before optimizing")]
    NoTestCases(String),

    /// Task exists but has no scoring functions
    #[error("Task {0} has no graders configured\nAdd at least one grader before optimizing")]
    NoGraders(String),

    /// Invalid request parameter or statistics input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Oracle reported a non-retryable failure (e.g. invalid credentials)
    #[error("Fatal oracle failure: {0}\nThe run was aborted; check provider credentials")]
    FatalOracle(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the request can never be evaluated as posed.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_) | Self::NoTestCases(_) | Self::NoGraders(_)
        )
    }
}
