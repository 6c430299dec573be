//! Vision question answering tool
//!
//! Asks the vision service for ranked answer candidates. Each successful
//! call replaces the analyst's candidate list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::error::ToolError;
use super::http::HttpEndpoint;
use super::traits::{Candidate, EvidenceSlot, Tool, ToolDefinition, ToolInput, ToolOutput};

pub const VQA_TOOL: &str = "vqa_tool";

/// Number of candidates requested by default
const DEFAULT_TOP_K: usize = 5;

#[derive(Serialize)]
struct VqaRequest<'a> {
    image_path: String,
    question: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct VqaResponse {
    candidates: Vec<Candidate>,
}

pub struct VqaTool {
    endpoint: HttpEndpoint,
    top_k: usize,
}

impl VqaTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_endpoint(HttpEndpoint::new(base_url))
    }

    pub fn with_endpoint(endpoint: HttpEndpoint) -> Self {
        Self {
            endpoint,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Tool for VqaTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: VQA_TOOL.to_string(),
            description: "Answer a question about the image with a vision model. \
                          Returns ranked answer candidates with confidences."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "Question to ask about the image; defaults to the user question"
                    }
                }
            }),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        EvidenceSlot::Candidates
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let question = input.arg_str("question").unwrap_or(&input.question);
        let request = VqaRequest {
            image_path: input.image.as_wire(),
            question,
            top_k: self.top_k,
        };

        let response: VqaResponse = self.endpoint.post_json("/vqa", &request).await?;
        if response.candidates.is_empty() {
            return Err(ToolError::NoResults(question.to_string()));
        }

        let mut candidates = response.candidates;
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(self.top_k);

        debug!(
            image = %input.image,
            top = %candidates[0],
            count = candidates.len(),
            "VQA candidates received"
        );
        Ok(ToolOutput::Candidates(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ImageRef;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input() -> ToolInput {
        ToolInput {
            question: "What animal is shown?".to_string(),
            image: ImageRef::from("images/42.jpg"),
            ..Default::default()
        }
    }

    #[test]
    fn test_definition() {
        let tool = VqaTool::new("http://localhost:8000");
        assert_eq!(tool.definition().name, "vqa_tool");
        assert_eq!(tool.slot(), EvidenceSlot::Candidates);
    }

    #[tokio::test]
    async fn test_candidates_sorted_and_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vqa"))
            .and(body_json(json!({
                "image_path": "images/42.jpg",
                "question": "What animal is shown?",
                "top_k": 2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    {"label": "horse", "confidence": 0.2},
                    {"label": "zebra", "confidence": 0.7},
                    {"label": "donkey", "confidence": 0.1}
                ]
            })))
            .mount(&server)
            .await;

        let tool = VqaTool::new(server.uri()).with_top_k(2);
        let output = tool.execute(&input()).await.unwrap();

        assert_eq!(
            output,
            ToolOutput::Candidates(vec![
                Candidate::new("zebra", 0.7),
                Candidate::new("horse", 0.2)
            ])
        );
    }

    #[tokio::test]
    async fn test_question_argument_overrides() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vqa"))
            .and(body_json(json!({
                "image_path": "images/42.jpg",
                "question": "What color is it?",
                "top_k": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"label": "white", "confidence": 0.9}]
            })))
            .mount(&server)
            .await;

        let mut input = input();
        input.args = json!({"question": "What color is it?"});
        let output = VqaTool::new(server.uri()).execute(&input).await.unwrap();
        assert!(matches!(output, ToolOutput::Candidates(c) if c[0].label == "white"));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vqa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = VqaTool::new(server.uri()).execute(&input()).await.unwrap_err();
        assert!(matches!(err, ToolError::NoResults(_)));
    }
}
