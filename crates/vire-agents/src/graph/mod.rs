//! Sequential state-graph runtime
//!
//! Nodes read an immutable snapshot of the state and return partial updates.
//! The runtime applies each update through the state's merge contract, then
//! follows fixed or conditional edges until a branch reaches [`END`].
//!
//! # Example
//!
//! ```ignore
//! let graph = StateGraph::new("analyst")
//!     .node(turn)
//!     .node(tools)
//!     .entry("agent")
//!     .conditional_edges("agent", route, vec![("continue", "tools"), ("rationale", END)])
//!     .edge("tools", "agent")
//!     .build()?;
//!
//! let result = graph.run(initial_state).await?;
//! ```

pub mod builder;
pub mod compiled;
pub mod config;
pub mod error;
pub mod node;
pub mod state;
pub mod subgraph;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{GraphBuildError, Router, StateGraph, END};
pub use compiled::{CompiledGraph, GraphResult};
pub use config::{GraphConfig, RetryPolicy};
pub use error::GraphError;
pub use node::{BoxedNode, FnNode, Node, NodeId};
pub use state::{GraphState, StateUpdate};
pub use subgraph::SubgraphNode;
