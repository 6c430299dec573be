//! JSON-over-HTTP client shared by the remote tools and the captioner
//!
//! Every request carries a timeout; timeouts, connection failures, 429 and
//! 5xx responses are retried with exponential backoff.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::ToolError;

/// Default timeout for remote tool requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// A remote service reachable under one base URL
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_base: Duration,
}

impl HttpEndpoint {
    /// Create an endpoint rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
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

    /// Set the base delay between retries
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and decode a JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ToolError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.client.post(&url).json(body))
            .await?;
        decode_json(response).await
    }

    /// GET with query parameters and decode a JSON reply
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ToolError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.client.get(&url).query(query))
            .await?;
        decode_json(response).await
    }

    /// GET with query parameters and return the raw body
    pub async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, ToolError> {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.client.get(&url).query(query))
            .await?;
        response
            .text()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))
    }

    /// Execute HTTP request with retry and backoff
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, ToolError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.send_once(build()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_base.saturating_mul(2u32.saturating_pow(attempt - 1));
                    warn!(
                        endpoint = %self.base_url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<Response, ToolError> {
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(self.timeout)
            } else {
                ToolError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %self.base_url, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            429 => Err(ToolError::RateLimited),
            code @ 500..=599 => Err(ToolError::Server { status: code, body }),
            code => Err(ToolError::Http { status: code, body }),
        }
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ToolError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ToolError::InvalidResponse(e.to_string()))
}
