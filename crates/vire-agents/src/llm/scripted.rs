//! Scripted provider that replays recorded responses
//!
//! Used to replay a fixed sequence of model outputs against a fresh state,
//! which makes whole analyst runs reproducible in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::config::LLMConfig;
use super::error::LlmError;
use super::message::Message;
use super::provider::{LLMProvider, LLMResponse};
use crate::tools::ToolDefinition;

/// A prompt the provider received, kept for assertions
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub temperature: Option<f64>,
}

impl RecordedCall {
    /// Concatenated message contents
    pub fn prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Provider answering from a queue of canned responses
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<LLMResponse>>,
    repeat_last: bool,
    last: Mutex<Option<LLMResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    /// Replay `responses` in order, failing once they run out
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat_last: false,
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replay plain-text responses in order
    pub fn from_texts<I, T>(texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| LLMResponse::text(t.as_ref()))
                .collect(),
        )
    }

    /// Keep answering with the final response once the queue is empty
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Number of completions served so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of every call received
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError> {
        let served = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| LlmError::InvalidResponse("call log poisoned".to_string()))?;
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
                temperature: config.and_then(|c| c.temperature),
            });
            calls.len() - 1
        };

        let next = self
            .responses
            .lock()
            .map_err(|_| LlmError::InvalidResponse("script poisoned".to_string()))?
            .pop_front();

        let mut last = self
            .last
            .lock()
            .map_err(|_| LlmError::InvalidResponse("script poisoned".to_string()))?;
        match next {
            Some(response) => {
                *last = Some(response.clone());
                Ok(response)
            }
            None if self.repeat_last => last.clone().ok_or(LlmError::ScriptExhausted(served)),
            None => Err(LlmError::ScriptExhausted(served)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}
