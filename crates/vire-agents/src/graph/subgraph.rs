//! Subgraph embedding
//!
//! A [`SubgraphNode`] runs a compiled child graph as a single node of its
//! parent. The child gets a fresh state built by the input projection and
//! only the output projection's update flows back, so the parent never sees
//! the child's working fields.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::compiled::CompiledGraph;
use super::error::GraphError;
use super::node::{Node, NodeId};
use super::state::GraphState;

type InputProjection<P, C> = Box<dyn Fn(&P) -> C + Send + Sync>;
type OutputProjection<P, C> = Box<dyn Fn(C) -> <P as GraphState>::Update + Send + Sync>;

/// Node that delegates to an embedded graph with isolated state
pub struct SubgraphNode<P: GraphState, C: GraphState> {
    id: NodeId,
    graph: Arc<CompiledGraph<C>>,
    input: InputProjection<P, C>,
    output: OutputProjection<P, C>,
}

impl<P: GraphState, C: GraphState> SubgraphNode<P, C> {
    /// Embed `graph`, mapping parent state in and child state out
    pub fn new<I, O>(id: impl Into<NodeId>, graph: Arc<CompiledGraph<C>>, input: I, output: O) -> Self
    where
        I: Fn(&P) -> C + Send + Sync + 'static,
        O: Fn(C) -> P::Update + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            graph,
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    /// The embedded graph
    pub fn graph(&self) -> &CompiledGraph<C> {
        &self.graph
    }
}

#[async_trait]
impl<P: GraphState, C: GraphState> Node<P> for SubgraphNode<P, C> {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &P) -> Result<P::Update, GraphError> {
        let child_state = (self.input)(state);

        let result = self
            .graph
            .run(child_state)
            .await
            .map_err(|e| GraphError::Subgraph {
                node_id: self.id.clone(),
                source: Box::new(e),
            })?;

        debug!(
            node = %self.id,
            subgraph = %self.graph.name(),
            steps = result.steps.len(),
            "Subgraph completed"
        );

        Ok((self.output)(result.state))
    }

    fn is_subgraph(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{StateGraph, END};
    use crate::graph::config::{GraphConfig, RetryPolicy};
    use crate::graph::test_support::{step, CounterState, CounterUpdate, FlakyNode, SlowNode};
    use std::time::Duration;

    fn child_graph() -> Arc<CompiledGraph<CounterState>> {
        let graph = StateGraph::<CounterState>::new("child")
            .node(step("inner_a"))
            .node(step("inner_b"))
            .entry("inner_a")
            .edge("inner_a", "inner_b")
            .edge("inner_b", END)
            .build()
            .unwrap();
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_subgraph_projects_output_only() {
        let sub = SubgraphNode::new(
            "child",
            child_graph(),
            |parent: &CounterState| CounterState {
                count: parent.count * 10,
                visited: vec![],
            },
            |child: CounterState| CounterUpdate {
                delta: child.count,
                visited: Some(format!("child:{}", child.visited.len())),
            },
        );
        assert!(sub.is_subgraph());

        let parent = StateGraph::<CounterState>::new("parent")
            .node(step("before"))
            .node(sub)
            .entry("before")
            .edge("before", "child")
            .edge("child", END)
            .build()
            .unwrap();

        let result = parent.run(CounterState::default()).await.unwrap();

        // before: +1, child starts at 10, adds 2, projects delta 12
        assert_eq!(result.state.count, 13);
        assert_eq!(result.state.visited, vec!["before", "child:2"]);
        assert_eq!(result.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_subgraph_failure_is_wrapped() {
        let failing = StateGraph::<CounterState>::new("child")
            .node(FlakyNode::new("broken", 5))
            .entry("broken")
            .edge("broken", END)
            .config(GraphConfig::default().with_retry_policy(RetryPolicy::no_retry()))
            .build()
            .unwrap();

        let parent = StateGraph::<CounterState>::new("parent")
            .node(SubgraphNode::new(
                "child",
                Arc::new(failing),
                |s: &CounterState| s.clone(),
                |_c: CounterState| CounterUpdate::default(),
            ))
            .entry("child")
            .edge("child", END)
            .build()
            .unwrap();

        let err = parent.run(CounterState::default()).await.unwrap_err();

        assert!(!err.is_recoverable());
        match err {
            GraphError::Subgraph { node_id, source } => {
                assert_eq!(node_id.as_str(), "child");
                assert!(matches!(*source, GraphError::NodeError { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn slow_child(config: GraphConfig) -> Arc<CompiledGraph<CounterState>> {
        let graph = StateGraph::<CounterState>::new("child")
            .node(SlowNode::new("slow_a"))
            .node(SlowNode::new("slow_b"))
            .node(SlowNode::new("slow_c"))
            .entry("slow_a")
            .edge("slow_a", "slow_b")
            .edge("slow_b", "slow_c")
            .edge("slow_c", END)
            .config(config)
            .build()
            .unwrap();
        Arc::new(graph)
    }

    fn parent_of(child: Arc<CompiledGraph<CounterState>>) -> CompiledGraph<CounterState> {
        StateGraph::<CounterState>::new("parent")
            .node(SubgraphNode::new(
                "child",
                child,
                |s: &CounterState| s.clone(),
                |c: CounterState| CounterUpdate {
                    delta: c.count,
                    visited: Some("child".to_string()),
                },
            ))
            .entry("child")
            .edge("child", END)
            .config(GraphConfig::default().with_node_timeout(Duration::from_secs(45)))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_subgraph_outlives_parent_node_timeout() {
        // three 30s child nodes, each within the child's own node timeout
        let parent = parent_of(slow_child(GraphConfig::default()));

        let result = parent.run(CounterState::default()).await.unwrap();

        assert_eq!(result.state.count, 3);
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subgraph_bounded_by_child_workflow_timeout() {
        let child = slow_child(GraphConfig::default().with_workflow_timeout(Duration::from_secs(50)));
        let parent = parent_of(child);

        let err = parent.run(CounterState::default()).await.unwrap_err();

        match err {
            GraphError::Subgraph { node_id, source } => {
                assert_eq!(node_id.as_str(), "child");
                assert!(matches!(*source, GraphError::WorkflowTimeout(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
