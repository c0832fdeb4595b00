//! Pipeline error types.

use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy shared by the producer and the consumers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request violated an input constraint. Never retried.
    #[error("invalid {field}: {message}")]
    Validation {
        /// The offending request field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The requested order does not exist.
    #[error("order not found: {0}")]
    NotFound(Uuid),

    /// The system of record failed. Fatal to the triggering request.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A cache or event channel was unavailable.
    #[error("transport error: {0}")]
    Transport(String),

    /// An event body could not be decoded.
    #[error("malformed event: {0}")]
    Parse(String),

    /// A consumer failed to process a well-formed event.
    #[error("handler error: {0}")]
    Handler(String),
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the field named by a validation error.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
