use crate::Error;
use thiserror::Error;

/// Coarse classification of the failures raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Execution,
    ResultCountViolation,
    EmptyResult,
    TypeAdapter,
    UnbalancedTransaction,
}

/// Failures originated by the engine itself.
///
/// They travel inside [`Error`] (possibly under additional context), use
/// [`QueryError::kind_of`] or `error.downcast_ref::<QueryError>()` to classify them.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Detected before any statement reached the runner.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Attached as context to a runner failure, the runner error stays the source.
    #[error("Query executed at {location} failed:\n{sql}")]
    Execution { location: String, sql: String },
    /// The statement already took effect, nothing is rolled back.
    #[error("The {operation} operation affected {count} row(s), expected {expected}")]
    ResultCountViolation {
        operation: &'static str,
        count: u64,
        expected: String,
    },
    #[error("The {operation} operation returned no result, exactly one was expected")]
    EmptyResult { operation: &'static str },
    #[error("Type adapter error: {0}")]
    TypeAdapter(String),
    #[error("Unbalanced transaction: {0}")]
    UnbalancedTransaction(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Configuration(..) => ErrorKind::Configuration,
            QueryError::Execution { .. } => ErrorKind::Execution,
            QueryError::ResultCountViolation { .. } => ErrorKind::ResultCountViolation,
            QueryError::EmptyResult { .. } => ErrorKind::EmptyResult,
            QueryError::TypeAdapter(..) => ErrorKind::TypeAdapter,
            QueryError::UnbalancedTransaction(..) => ErrorKind::UnbalancedTransaction,
        }
    }

    /// Kind of the outermost [`QueryError`] carried by `error`, if any.
    pub fn kind_of(error: &Error) -> Option<ErrorKind> {
        error.downcast_ref::<QueryError>().map(QueryError::kind)
    }

    pub fn configuration(message: impl Into<String>) -> Error {
        Error::new(QueryError::Configuration(message.into()))
    }

    pub fn type_adapter(message: impl Into<String>) -> Error {
        Error::new(QueryError::TypeAdapter(message.into()))
    }

    pub fn unbalanced(message: impl Into<String>) -> Error {
        Error::new(QueryError::UnbalancedTransaction(message.into()))
    }
}
