//! OpenAI-compatible chat completions provider
//!
//! Talks to any server exposing `POST {base}/chat/completions` in the
//! OpenAI wire format, such as a local LM Studio or vLLM instance.
//!
//! # Production Features
//!
//! - HTTP timeout and retry with exponential backoff
//! - Native tool calling via the `tools` request field
//! - Typed errors for rate limits, timeouts, and server failures

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::config::{LLMConfig, TokenUsage};
use super::error::LlmError;
use super::message::{Message, Role, ToolCall};
use super::provider::{LLMProvider, LLMResponse};
use crate::tools::ToolDefinition;

/// Default local inference endpoint
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1234/v1";

/// Default reasoning model
pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-1.7B";

/// Default timeout for completion requests
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Provider for OpenAI-compatible chat completion endpoints
///
/// # Example
///
/// ```rust,ignore
/// let provider = OpenAICompatibleProvider::new("http://127.0.0.1:1234/v1", "Qwen/Qwen3-1.7B")
///     .with_temperature(0.0);
/// ```
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_config: LLMConfig,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAICompatibleProvider {
    /// Create a provider for `base_url` serving `model`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            default_config: LLMConfig::new(model),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
        }
    }

    /// Provider for the default local endpoint and model
    pub fn local() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL).with_temperature(0.0)
    }

    /// Set bearer API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set default sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.default_config.temperature = Some(temperature);
        self
    }

    /// Set default max tokens
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.default_config.max_tokens = Some(max_tokens);
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set custom max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Get effective configuration, preferring runtime config over defaults
    fn effective_config<'a>(&'a self, runtime: Option<&'a LLMConfig>) -> &'a LLMConfig {
        runtime.unwrap_or(&self.default_config)
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: &LLMConfig,
    ) -> Value {
        let model = if config.model.is_empty() {
            &self.default_config.model
        } else {
            &config.model
        };

        let mut body = json!({
            "model": model,
            "messages": messages.iter().map(message_to_wire).collect::<Vec<_>>(),
        });

        if let Some(temperature) = config.temperature.or(self.default_config.temperature) {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = config.max_tokens.or(self.default_config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools.iter().map(tool_to_wire).collect::<Vec<_>>());
        }

        body
    }

    /// Execute HTTP request with retry and backoff
    async fn execute_with_retry(&self, body: &Value) -> Result<ChatCompletion, LlmError> {
        let mut attempt = 0;
        loop {
            match self.execute_single_request(body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "LLM request failed, will retry");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_single_request(&self, body: &Value) -> Result<ChatCompletion, LlmError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<ChatCompletion>()
                .await
                .map_err(|e| LlmError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            429 => Err(LlmError::RateLimited),
            code => Err(LlmError::Http { status: code, body }),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LlmError> {
        let config = self.effective_config(config);
        let body = self.build_request_body(messages, tools, config);
        debug!(
            base_url = %self.base_url,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion"
        );

        let completion = self.execute_with_retry(&body).await?;
        completion.into_response()
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn default_model(&self) -> &str {
        &self.default_config.model
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn message_to_wire(message: &Message) -> Value {
    let mut wire = json!({
        "role": role_str(message.role),
        "content": message.content,
    });
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    if let Some(calls) = message.tool_calls.as_ref().filter(|c| !c.is_empty()) {
        wire["tool_calls"] = json!(calls
            .iter()
            .map(|call| json!({
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.name,
                    "arguments": call.arguments.to_string(),
                }
            }))
            .collect::<Vec<_>>());
    }
    wire
}

fn tool_to_wire(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ============================================================================
// Wire response
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl ChatCompletion {
    fn into_response(self) -> Result<LLMResponse, LlmError> {
        let usage = self
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in completion".to_string()))?;

        let content = choice.message.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                arguments: parse_arguments(&call.function.arguments),
                name: call.function.name,
            })
            .collect();

        let message = if tool_calls.is_empty() {
            Message::assistant(&content)
        } else {
            Message::assistant_with_tool_calls(&content, tool_calls)
        };

        let mut response = LLMResponse::new(message);
        if let Some(usage) = usage {
            response = response.with_usage(usage);
        }
        Ok(response)
    }
}

/// Tool arguments arrive as a JSON-encoded string; malformed input becomes `{}`
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!(error = %e, "Tool call arguments were not valid JSON");
        json!({})
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        })
    }

    fn provider(server: &MockServer) -> OpenAICompatibleProvider {
        OpenAICompatibleProvider::new(format!("{}/v1", server.uri()), "test-model")
            .with_temperature(0.0)
            .with_max_retries(1)
    }

    #[test]
    fn test_provider_defaults() {
        let provider = OpenAICompatibleProvider::local();
        assert_eq!(provider.name(), "openai-compatible");
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_request_body_includes_tools() {
        let provider = OpenAICompatibleProvider::new("http://x/v1", "m").with_max_tokens(64);
        let tools = vec![ToolDefinition {
            name: "vqa_tool".to_string(),
            description: "Visual question answering".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = provider.build_request_body(
            &[Message::system("sys"), Message::user("q")],
            &tools,
            &LLMConfig::new("other").with_temperature(0.3),
        );

        assert_eq!(body["model"], "other");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "vqa_tool");
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"query\":\"zebra\"}"), json!({"query": "zebra"}));
        assert_eq!(parse_arguments("not json"), json!({}));
    }

    #[tokio::test]
    async fn test_http_text_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Finish")))
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(&[Message::user("decide")], &[], None)
            .await
            .unwrap();

        assert_eq!(response.content(), "Finish");
        assert_eq!(response.usage, Some(TokenUsage::new(12, 3)));
        assert!(!response.message.has_tool_calls());
    }

    #[tokio::test]
    async fn test_http_native_tool_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "wikipedia", "arguments": "{\"query\":\"zebra\"}"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(&[Message::user("decide")], &[], None)
            .await
            .unwrap();

        let calls = response.message.tool_calls.unwrap();
        assert_eq!(calls[0].name, "wikipedia");
        assert_eq!(calls[0].arguments, json!({"query": "zebra"}));
    }

    #[tokio::test]
    async fn test_http_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .mount(&server)
            .await;

        let response = provider(&server)
            .with_api_key("secret")
            .complete(&[Message::user("hi")], &[], None)
            .await
            .unwrap();

        assert_eq!(response.content(), "ok");
    }

    #[tokio::test]
    async fn test_http_retry_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("recovered")))
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(&[Message::user("hi")], &[], None)
            .await
            .unwrap();

        assert_eq!(response.content(), "recovered");
    }

    #[tokio::test]
    async fn test_http_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&[Message::user("hi")], &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_http_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&[Message::user("hi")], &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
