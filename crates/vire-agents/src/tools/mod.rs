//! Tools the analyst loop can dispatch
//!
//! - `vqa_tool`: ranked answer candidates from the vision service
//! - `analyze_image_object`: object-level description from the vision service
//! - `wikipedia` / `arxiv`: rate-limited knowledge lookups
//! - `llm_knowledge`: background facts from a knowledge model

pub mod arxiv;
pub mod error;
pub mod http;
pub mod llm_knowledge;
pub mod object_analysis;
pub mod rate_limit;
pub mod traits;
pub mod vqa;
pub mod wikipedia;

pub use arxiv::{ArxivTool, ARXIV_TOOL, DEFAULT_ARXIV_BASE_URL};
pub use error::ToolError;
pub use http::HttpEndpoint;
pub use llm_knowledge::{
    LlmKnowledgeTool, DEFAULT_KNOWLEDGE_BASE_URL, DEFAULT_KNOWLEDGE_MODEL, LLM_KNOWLEDGE_TOOL,
};
pub use object_analysis::{ObjectAnalysisTool, OBJECT_ANALYSIS_TOOL};
pub use rate_limit::{RateLimiter, DEFAULT_SEARCH_DELAY};
pub use traits::{
    Candidate, DynTool, EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolInput,
    ToolOutput, ToolRegistry,
};
pub use vqa::{VqaTool, VQA_TOOL};
pub use wikipedia::{WikipediaTool, DEFAULT_WIKIPEDIA_BASE_URL, WIKIPEDIA_TOOL};
