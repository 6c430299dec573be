//! Object-level image analysis tool

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ToolError;
use super::http::HttpEndpoint;
use super::traits::{
    EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolInput, ToolOutput,
};

pub const OBJECT_ANALYSIS_TOOL: &str = "analyze_image_object";

#[derive(Serialize)]
struct ObjectRequest<'a> {
    image_path: String,
    question: &'a str,
}

#[derive(Deserialize)]
struct ObjectResponse {
    description: String,
}

/// Describes the objects relevant to the question via the vision service
pub struct ObjectAnalysisTool {
    endpoint: HttpEndpoint,
}

impl ObjectAnalysisTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_endpoint(HttpEndpoint::new(base_url))
    }

    pub fn with_endpoint(endpoint: HttpEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Tool for ObjectAnalysisTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OBJECT_ANALYSIS_TOOL.to_string(),
            description: "Describe the main objects in the image, their attributes and \
                          relations, focusing on what the question asks about."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "What to look for; defaults to the user question"
                    }
                }
            }),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        EvidenceSlot::Knowledge(KnowledgeSource::ObjectAnalysis)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let request = ObjectRequest {
            image_path: input.image.as_wire(),
            question: input.arg_str("question").unwrap_or(&input.question),
        };
        let response: ObjectResponse = self.endpoint.post_json("/objects", &request).await?;

        let description = response.description.trim();
        if description.is_empty() {
            return Err(ToolError::InvalidResponse("empty object description".to_string()));
        }
        Ok(ToolOutput::Text(description.to_string()))
    }
}
