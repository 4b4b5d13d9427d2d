use std::fmt;

use dbstream_types::QueryError;

/// The backend hook an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    Load,
    Save,
    Remove,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("load"),
            Self::Save => f.write_str("save"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// Errors surfaced by cursors and the stages built on them.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// A backend hook was called without being implemented.
    #[error("{0} is not implemented")]
    NotImplemented(Hook),

    /// The backend reported a failed operation.
    #[error("backend {hook} failed: {message}")]
    Backend { hook: Hook, message: String },

    /// A caller-supplied predicate, transform or callback failed.
    #[error("callback failed: {0}")]
    Callback(String),

    /// The write side was already closed with `end()`.
    #[error("write after end")]
    WriteAfterEnd,

    /// The reading half of a pass-through stage was dropped.
    #[error("stage closed")]
    StageClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

impl CursorError {
    /// Create a backend error for the given hook.
    pub fn backend(hook: Hook, message: impl Into<String>) -> Self {
        Self::Backend {
            hook,
            message: message.into(),
        }
    }

    /// Create a callback error from anything displayable.
    pub fn callback(err: impl fmt::Display) -> Self {
        Self::Callback(err.to_string())
    }
}

impl PartialEq for CursorError {
    fn eq(&self, other: &Self) -> bool {
        // Compare by display representation for test convenience.
        self.to_string() == other.to_string()
    }
}

/// Result alias for cursor operations.
pub type CursorResult<T> = Result<T, CursorError>;
