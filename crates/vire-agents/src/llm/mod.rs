//! Language-model capability
//!
//! - [`LLMProvider`]: provider-agnostic completion interface
//! - [`OpenAICompatibleProvider`]: `/chat/completions` over HTTP
//! - [`ScriptedProvider`]: deterministic replay for tests and dry runs

pub mod config;
pub mod error;
pub mod message;
pub mod openai;
pub mod provider;
pub mod scripted;

pub use config::{LLMConfig, TokenUsage};
pub use error::LlmError;
pub use message::{Message, Role, ToolCall};
pub use openai::OpenAICompatibleProvider;
pub use provider::{LLMProvider, LLMResponse};
pub use scripted::{RecordedCall, ScriptedProvider};
