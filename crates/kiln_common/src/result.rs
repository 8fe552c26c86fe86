//! Common result and error types for the Kiln builder.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates a broken builder invariant (a bug in Kiln), not a
/// user-facing problem. User problems are reported as diagnostics or as
/// structured build errors.
pub type KilnResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Kiln, not a user input problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal builder error: {message}")]
pub struct InternalError {
    /// Description of the broken invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
