//! arXiv search tool
//!
//! Queries the arXiv export API and reads the first entry of the Atom feed.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use super::error::ToolError;
use super::http::HttpEndpoint;
use super::rate_limit::RateLimiter;
use super::traits::{
    EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolInput, ToolOutput,
};

pub const ARXIV_TOOL: &str = "arxiv";

pub const DEFAULT_ARXIV_BASE_URL: &str = "https://export.arxiv.org";

/// Longest abstract passed on to the analyst
const MAX_SUMMARY_CHARS: usize = 4000;

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid entry pattern"));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<published>(.*?)</published>").expect("valid published pattern")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("valid title pattern"));
static AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid author pattern")
});
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").expect("valid summary pattern")
});

/// First paper of an Atom feed
#[derive(Debug, Clone, PartialEq)]
pub struct ArxivEntry {
    pub published: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
}

impl ArxivEntry {
    fn render(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published,
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
}

/// Parse the first `<entry>` of an arXiv Atom feed
pub fn parse_first_entry(feed: &str) -> Option<ArxivEntry> {
    let entry = ENTRY.captures(feed)?.get(1)?.as_str();

    let published = capture(&PUBLISHED, entry)
        .map(|p| p.chars().take(10).collect())
        .unwrap_or_default();
    let title = capture(&TITLE, entry)?;
    let authors = AUTHOR
        .captures_iter(entry)
        .filter_map(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .collect();
    let summary = capture(&SUMMARY, entry)
        .map(|s| s.chars().take(MAX_SUMMARY_CHARS).collect())
        .unwrap_or_default();

    Some(ArxivEntry {
        published,
        title,
        authors,
        summary,
    })
}

/// Strip characters the arXiv query syntax treats as operators
fn sanitize_query(query: &str) -> String {
    collapse_whitespace(&query.replace([':', '-'], " "))
}

pub struct ArxivTool {
    endpoint: HttpEndpoint,
    limiter: RateLimiter,
}

impl ArxivTool {
    pub fn new(base_url: impl Into<String>, limiter: RateLimiter) -> Self {
        Self::with_endpoint(HttpEndpoint::new(base_url), limiter)
    }

    pub fn with_endpoint(endpoint: HttpEndpoint, limiter: RateLimiter) -> Self {
        Self { endpoint, limiter }
    }
}

#[async_trait]
impl Tool for ArxivTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ARXIV_TOOL.to_string(),
            description: "Search for information on a given topic using Arxiv".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms; defaults to the user question"
                    }
                }
            }),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        EvidenceSlot::Knowledge(KnowledgeSource::Academic)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let query = sanitize_query(input.query());
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("empty arxiv query".to_string()));
        }

        self.limiter.acquire(ARXIV_TOOL).await;
        let search = format!("all:{query}");
        let feed = self
            .endpoint
            .get_text(
                "/api/query",
                &[("search_query", search.as_str()), ("max_results", "1")],
            )
            .await?;

        let entry = parse_first_entry(&feed).ok_or_else(|| ToolError::NoResults(query.clone()))?;
        debug!(query = %query, title = %entry.title, "arXiv entry found");
        Ok(ToolOutput::Text(entry.render()))
    }
}
