//! LLM configuration types
//!
//! Provides configuration and usage tracking types for LLM providers.

use serde::{Deserialize, Serialize};

/// Token usage statistics from an LLM completion.
///
/// # Example
///
/// ```
/// use vire_agents::llm::TokenUsage;
///
/// let usage = TokenUsage::new(100, 50);
/// assert_eq!(usage.total_tokens, 150);
///
/// let total = usage.clone() + TokenUsage::new(200, 75);
/// assert_eq!(total.total_tokens, 425);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt
    pub input_tokens: u64,
    /// Number of tokens in the generated output
    pub output_tokens: u64,
    /// Total tokens (input + output)
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a new TokenUsage with calculated total
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }
}

impl std::ops::Add for TokenUsage {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Per-request generation settings
///
/// # Example
///
/// ```
/// use vire_agents::llm::LLMConfig;
///
/// let config = LLMConfig::new("Qwen/Qwen3-1.7B")
///     .with_temperature(0.0)
///     .with_max_tokens(512);
///
/// assert_eq!(config.model, "Qwen/Qwen3-1.7B");
/// assert_eq!(config.temperature, Some(0.0));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LLMConfig {
    /// Model identifier served by the endpoint
    pub model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate in the response
    pub max_tokens: Option<u64>,
}

impl LLMConfig {
    /// Create a new configuration with the specified model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set the maximum tokens to generate
    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}
