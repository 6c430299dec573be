//! Error types for the graph runtime

use std::time::Duration;

use thiserror::Error;

use super::node::NodeId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while executing a compiled graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Node failed; the runtime may retry it
    #[error("Node error in {node_id}: {message}")]
    NodeError {
        node_id: NodeId,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Node failed in a way that must end the invocation immediately
    #[error("Node {node_id} aborted: {message}")]
    Aborted {
        node_id: NodeId,
        message: String,
        #[source]
        source: BoxError,
    },

    /// Node did not finish within the configured timeout
    #[error("Node timeout: {0}")]
    NodeTimeout(NodeId),

    /// Router produced a label with no matching branch
    #[error("Routing error in {node_id}: no branch for '{label}'")]
    RoutingError { node_id: NodeId, label: String },

    /// Node has no outgoing edge and is not terminal
    #[error("Node {0} has no outgoing edge")]
    DeadEnd(NodeId),

    /// An embedded subgraph failed
    #[error("Subgraph {node_id} failed: {source}")]
    Subgraph {
        node_id: NodeId,
        #[source]
        source: Box<GraphError>,
    },

    /// Step ceiling reached before the graph hit END
    #[error("Max steps exceeded: {0}")]
    MaxStepsExceeded(usize),

    /// Whole invocation timed out
    #[error("Workflow timeout after {0:?}")]
    WorkflowTimeout(Duration),

    /// Retry budget exhausted for a node
    #[error("Max retries exceeded for node {node_id}: {attempts} attempts")]
    MaxRetriesExceeded {
        node_id: NodeId,
        attempts: usize,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Create a recoverable node error with a message
    pub fn node_error(node_id: impl Into<NodeId>, message: impl Into<String>) -> Self {
        Self::NodeError {
            node_id: node_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a recoverable node error with a source
    pub fn node_error_with_source(
        node_id: impl Into<NodeId>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::NodeError {
            node_id: node_id.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a fatal error that skips the retry policy
    pub fn aborted(
        node_id: impl Into<NodeId>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Aborted {
            node_id: node_id.into(),
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Create a routing error
    pub fn routing_error(node_id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self::RoutingError {
            node_id: node_id.into(),
            label: label.into(),
        }
    }

    /// Check if the runtime may retry the failed node
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GraphError::NodeTimeout(_) | GraphError::NodeError { .. })
    }

    /// Check if the error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            GraphError::NodeTimeout(_) | GraphError::WorkflowTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    static_assertions::assert_impl_all!(GraphError: Send, Sync);

    #[test]
    fn test_recoverable_classification() {
        assert!(GraphError::node_error("agent", "llm unavailable").is_recoverable());
        assert!(GraphError::NodeTimeout(NodeId::from("tools")).is_recoverable());
        assert!(!GraphError::routing_error("agent", "maybe").is_recoverable());
        assert!(!GraphError::MaxStepsExceeded(10).is_recoverable());

        let aborted = GraphError::aborted("tools", std::io::Error::other("denied"));
        assert!(!aborted.is_recoverable());
    }

    #[test]
    fn test_timeout_classification() {
        assert!(GraphError::NodeTimeout(NodeId::from("tools")).is_timeout());
        assert!(GraphError::WorkflowTimeout(Duration::from_secs(1)).is_timeout());
        assert!(!GraphError::node_error("agent", "x").is_timeout());
    }

    #[test]
    fn test_aborted_keeps_source() {
        let err = GraphError::aborted("tools", std::io::Error::other("denied"));
        assert_eq!(err.to_string(), "Node tools aborted: denied");
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_subgraph_error_display() {
        let err = GraphError::Subgraph {
            node_id: NodeId::from("manager_analyst"),
            source: Box::new(GraphError::MaxStepsExceeded(64)),
        };
        assert!(err.to_string().contains("manager_analyst"));
        assert!(err.to_string().contains("Max steps exceeded: 64"));
    }
}
