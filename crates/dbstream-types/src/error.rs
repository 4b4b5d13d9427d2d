use thiserror::Error;

/// Errors produced while building query or write values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid sort direction {0}: expected 1 or -1")]
    InvalidDirection(i64),
}
