//! Error types for the breakdown pipeline.

use thiserror::Error;

/// Errors from prompt building and the completion endpoint.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Completion service is not configured: {0}")]
    Configuration(String),

    #[error("Completion service rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("Completion service unavailable: {0}")]
    Unavailable(String),

    /// The call succeeded but carried no usable text.
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

impl AiError {
    /// Only transport-level failures are worth retrying. Bad credentials and
    /// missing configuration will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AiError::Unavailable(_))
    }
}

/// Errors surfaced by [`TaskBreakdown::decompose`](super::TaskBreakdown::decompose).
#[derive(Debug, Error)]
pub enum BreakdownError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task not found")]
    NotFound,

    #[error("Completion service is not configured: {0}")]
    Configuration(String),

    #[error("Completion service rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("Completion service unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to save subtasks: {0:#}")]
    Persistence(anyhow::Error),
}

impl BreakdownError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BreakdownError::Unavailable(_))
    }
}

impl From<AiError> for BreakdownError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::InvalidInput(msg) => BreakdownError::InvalidInput(msg),
            AiError::Configuration(msg) => BreakdownError::Configuration(msg),
            AiError::Auth { status } => BreakdownError::Auth { status },
            AiError::Unavailable(msg) | AiError::MalformedResponse(msg) => {
                BreakdownError::Unavailable(msg)
            }
        }
    }
}
