//! Typed errors for tool and captioner calls

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("No results for '{0}'")]
    NoResults(String),

    #[error("Knowledge model failed: {0}")]
    Llm(#[from] LlmError),
}

impl ToolError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolError::Timeout(_)
                | ToolError::Connection(_)
                | ToolError::RateLimited
                | ToolError::Server { .. }
        )
    }
}
