//! Background-knowledge generation tool
//!
//! A second language model writes short background facts about the key
//! concepts in the caption and question.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::error::ToolError;
use super::traits::{
    EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolInput, ToolOutput,
};
use crate::analyst::decision::strip_think;
use crate::analyst::prompts::render;
use crate::llm::{LLMConfig, LLMProvider, Message};

pub const LLM_KNOWLEDGE_TOOL: &str = "llm_knowledge";

pub const DEFAULT_KNOWLEDGE_BASE_URL: &str = "http://127.0.0.1:1236/v1";

pub const DEFAULT_KNOWLEDGE_MODEL: &str = "meta-llama/Llama-2-7b-chat-hf";

pub const DEFAULT_KNOWLEDGE_TEMPERATURE: f64 = 0.7;

const KNOWLEDGE_PROMPT: &str = "\
Please generate the background knowledge based on the key words in the context and question.
======
Context: A snowboarder making a run down a powdery slope on a sunny day.
Question: What is this man on?
LLM_Knowledge: A snowboarder is a person who rides a snowboard. Snowboarding is a winter sport that involves riding down a snow-covered slope on a snowboard. xxxxxx
A powdery slope is a snow-covered slope that is covered in powder, or loose snow. Powdery slopes are often found in ski resorts, where skiers and snowboarders can ride down them.
xxxxxx A sunny day is a day with clear skies and bright sunshine. Sunny days are often associated with warm weather, and are a common sight in the summer. xxxxxx
======
Context: {caption}
Question: {question}
LLM_Knowledge:";

pub struct LlmKnowledgeTool {
    llm: Arc<dyn LLMProvider>,
    config: LLMConfig,
}

impl LlmKnowledgeTool {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        let config = LLMConfig::new(llm.default_model())
            .with_temperature(DEFAULT_KNOWLEDGE_TEMPERATURE);
        Self { llm, config }
    }

    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Tool for LlmKnowledgeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: LLM_KNOWLEDGE_TOOL.to_string(),
            description: "Uses the LLM to generate background knowledge, definitions, or \
                          common-sense context about key concepts found in the image caption \
                          and question."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "caption": {"type": "string", "description": "Image caption"},
                    "question": {"type": "string", "description": "Question about the image"}
                }
            }),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        EvidenceSlot::Knowledge(KnowledgeSource::Generated)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let caption = input.arg_str("caption").unwrap_or(&input.context);
        let question = input.arg_str("question").unwrap_or(&input.question);
        let prompt = render(
            KNOWLEDGE_PROMPT,
            &[("caption", caption), ("question", question)],
        );

        let response = self
            .llm
            .complete(&[Message::user(&prompt)], &[], Some(&self.config))
            .await?;

        let knowledge = strip_think(response.content()).trim().to_string();
        if knowledge.is_empty() {
            return Err(ToolError::InvalidResponse("knowledge model returned nothing".to_string()));
        }
        debug!(chars = knowledge.len(), "Background knowledge generated");
        Ok(ToolOutput::Text(knowledge))
    }
}
