//! Node abstractions for the graph runtime
//!
//! A node reads the current state and returns a partial update. Routing is
//! decided by the graph's edges, never by the node itself.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::GraphError;
use super::state::GraphState;

/// Unique identifier for a node in a graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new NodeId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A computation step in a graph
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Identifier of this node
    fn id(&self) -> &NodeId;

    /// Compute a partial update from the current state
    async fn run(&self, state: &S) -> Result<S::Update, GraphError>;

    /// Whether this node runs an embedded graph
    fn is_subgraph(&self) -> bool {
        false
    }
}

/// Shared handle to a node
pub type BoxedNode<S> = Arc<dyn Node<S>>;

/// Node backed by an async closure over an owned state snapshot
///
/// ```ignore
/// let node = FnNode::new("caption", move |state: WorkflowState| async move {
///     Ok(WorkflowUpdate::caption(describe(&state.image).await?))
/// });
/// ```
pub struct FnNode<S, F> {
    id: NodeId,
    func: F,
    _state: PhantomData<fn() -> S>,
}

impl<S, F> FnNode<S, F> {
    /// Wrap a closure as a node
    pub fn new(id: impl Into<NodeId>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
            _state: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<S, F>
where
    S: GraphState,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<S::Update, GraphError>> + Send,
{
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &S) -> Result<S::Update, GraphError> {
        (self.func)(state.clone()).await
    }
}
