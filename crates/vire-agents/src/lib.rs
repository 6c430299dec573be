//! vire-agents: analyst-agent orchestration for visual question answering
//!
//! A question about an image flows through a small state graph:
//!
//! ```text
//! caption → <tier>_analyst → final_processing
//! ```
//!
//! Several tiers can be chained (`junior_analyst → senior_analyst →
//! manager_analyst`); the last one's answer is final.
//!
//! Each analyst node embeds a loop in which a language model repeatedly picks
//! one of its permitted tools (vision QA, Wikipedia, arXiv, generated
//! knowledge, object analysis) until it has enough evidence, then writes a
//! rationale and commits to an answer.
//!
//! # Modules
//!
//! - [`graph`]: sequential state-graph runtime with retries, timeouts and subgraphs
//! - [`llm`]: provider trait, OpenAI-compatible client, scripted replay provider
//! - [`tools`]: tool trait, registry and the HTTP/LLM-backed tools
//! - [`vision`]: image handles and captioners
//! - [`analyst`]: descriptors, decision parsing, loop nodes and routing
//! - [`pipeline`]: the top-level pipeline and its builder

pub mod analyst;
pub mod error;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod tools;
pub mod vision;

pub use analyst::{Analyst, AnalystLoopConfig, AnalystTier};
pub use error::AgentError;
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOutput};
pub use vision::ImageRef;
