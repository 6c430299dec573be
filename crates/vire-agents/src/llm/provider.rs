//! LLM Provider trait definition
//!
//! Defines the language-model capability used by the analyst nodes: take a
//! conversation plus the tools the model may request, return the assistant's
//! message with optional native tool calls.

use async_trait::async_trait;

use super::config::{LLMConfig, TokenUsage};
use super::error::LlmError;
use super::message::Message;
use crate::tools::ToolDefinition;

/// LLM completion response
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// The assistant's response message
    pub message: Message,
    /// Token usage statistics (if available from provider)
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// Create a new response with just a message
    pub fn new(message: Message) -> Self {
        Self { message, usage: None }
    }

    /// Create a plain-text assistant response
    pub fn text(content: &str) -> Self {
        Self::new(Message::assistant(content))
    }

    /// Add token usage statistics to the response
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Assistant text content
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Core LLM Provider trait
///
/// # Example Implementation
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use vire_agents::llm::{LLMProvider, LLMResponse, LLMConfig, LlmError, Message};
/// use vire_agents::tools::ToolDefinition;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl LLMProvider for EchoProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _tools: &[ToolDefinition],
///         _config: Option<&LLMConfig>,
///     ) -> Result<LLMResponse, LlmError> {
///         let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
///         Ok(LLMResponse::text(last))
///     }
///
///     fn name(&self) -> &str { "echo" }
///     fn default_model(&self) -> &str { "echo-1" }
/// }
/// ```
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion response
    ///
    /// # Arguments
    /// * `messages` - Conversation including the rendered prompt
    /// * `tools` - Tools the model may request; empty at synthesis points
    /// * `config` - Optional per-request overrides
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError>;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;

    /// Default model identifier for this provider
    fn default_model(&self) -> &str;
}
