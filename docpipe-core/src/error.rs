//! Error types for docpipe-core.
//!
//! Construction, validation and serialization failures. Transport errors live in the client crate.

use thiserror::Error;

/// Pipeline construction, validation and serialization error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A value with no expression or aggregate shape was used where one is required.
    #[error("Unsupported operand: {0}")]
    UnsupportedOperand(String),

    /// Malformed builder arguments (conflicting or missing options, bad paths, negative counts).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database mismatch: expected a reference in '{expected}' but got one in '{actual}'")]
    DatabaseMismatch { expected: String, actual: String },

    /// First offending node found by the validator.
    #[error("Function {method}() called with invalid data. {message}")]
    Validation { method: String, message: String },

    /// A custom option value that has no wire representation.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data reached the serializer that validation should have rejected.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub(crate) fn validation(method: &str, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl serde::Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
