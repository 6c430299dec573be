//! Errors raised by language-model providers

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),

    #[error("Scripted provider exhausted after {0} responses")]
    ScriptExhausted(usize),
}

impl LlmError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Connection(_) | LlmError::RateLimited => true,
            LlmError::Http { status, .. } => *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::ScriptExhausted(_) => false,
        }
    }
}
