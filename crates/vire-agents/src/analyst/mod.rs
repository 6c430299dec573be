//! Analyst agents
//!
//! One loop skeleton serves every tier. An [`Analyst`] supplies the permitted
//! tools and prompts, and [`build_analyst_graph`] wires them into
//! `agent → tools → agent … → rationale → final_reasoning`.

pub mod decision;
pub mod descriptor;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod routing;
pub mod state;

pub use decision::{decide, parse_action, strip_think, AgentAction, ParseFailure, ToolRequest};
pub use descriptor::{Analyst, AnalystPrompts, AnalystTier};
pub use graph::build_analyst_graph;
pub use nodes::{
    extract_answer, DispatchNode, FinalReasoningNode, RationaleNode, TurnNode, AGENT_NODE,
    FINAL_NODE, RATIONALE_NODE, TOOLS_NODE,
};
pub use routing::{should_continue, Route};
pub use state::{AnalystLoopConfig, AnalystLoopState, AnalystUpdate, KnowledgeEntry};
