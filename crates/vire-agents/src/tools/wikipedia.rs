//! Wikipedia lookup tool
//!
//! Finds the best matching page through the MediaWiki search API, then
//! fetches its plain-text summary from the REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::error::ToolError;
use super::http::HttpEndpoint;
use super::rate_limit::RateLimiter;
use super::traits::{
    EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolInput, ToolOutput,
};

pub const WIKIPEDIA_TOOL: &str = "wikipedia";

pub const DEFAULT_WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org";

/// Longest summary passed on to the analyst
const MAX_SUMMARY_CHARS: usize = 4000;

#[derive(Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    extract: String,
}

pub struct WikipediaTool {
    endpoint: HttpEndpoint,
    limiter: RateLimiter,
}

impl WikipediaTool {
    pub fn new(base_url: impl Into<String>, limiter: RateLimiter) -> Self {
        Self::with_endpoint(HttpEndpoint::new(base_url), limiter)
    }

    pub fn with_endpoint(endpoint: HttpEndpoint, limiter: RateLimiter) -> Self {
        Self { endpoint, limiter }
    }

    async fn top_title(&self, query: &str) -> Result<String, ToolError> {
        let response: SearchResponse = self
            .endpoint
            .get_json(
                "/w/api.php",
                &[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", query),
                    ("format", "json"),
                    ("srlimit", "1"),
                ],
            )
            .await?;

        response
            .query
            .search
            .into_iter()
            .next()
            .map(|hit| hit.title)
            .ok_or_else(|| ToolError::NoResults(query.to_string()))
    }

    async fn summary(&self, title: &str) -> Result<PageSummary, ToolError> {
        let encoded = urlencoding::encode(&title.replace(' ', "_")).into_owned();
        self.endpoint
            .get_json(&format!("/api/rest_v1/page/summary/{encoded}"), &[])
            .await
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: WIKIPEDIA_TOOL.to_string(),
            description: "Search for information on a given topic using Wikipedia".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Topic to look up; defaults to the user question"
                    }
                }
            }),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        EvidenceSlot::Knowledge(KnowledgeSource::Encyclopedic)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let query = input.query();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("empty wikipedia query".to_string()));
        }

        self.limiter.acquire(WIKIPEDIA_TOOL).await;
        let title = self.top_title(query).await?;
        debug!(query, title = %title, "Wikipedia page selected");

        self.limiter.acquire(WIKIPEDIA_TOOL).await;
        let page = self.summary(&title).await?;

        let extract: String = page.extract.trim().chars().take(MAX_SUMMARY_CHARS).collect();
        if extract.is_empty() {
            return Err(ToolError::NoResults(title));
        }
        Ok(ToolOutput::Text(format!(
            "Page: {}\nSummary: {}",
            page.title, extract
        )))
    }
}
