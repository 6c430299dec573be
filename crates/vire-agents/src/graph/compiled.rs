//! Compiled graph runtime
//!
//! Executes one node at a time starting from the entry point. After each
//! node the runtime merges its update into the state, then follows the
//! node's outgoing edge (evaluating the router for conditional edges)
//! until a branch reaches [`END`].

use std::collections::HashMap;

use tokio::time::timeout;
use tracing::{debug, warn};

use super::builder::{Edge, END};
use super::config::GraphConfig;
use super::error::GraphError;
use super::node::{BoxedNode, NodeId};
use super::state::GraphState;

/// Result of a graph invocation
#[derive(Debug, Clone)]
pub struct GraphResult<S: GraphState> {
    /// Final state
    pub state: S,
    /// Nodes executed, in order
    pub steps: Vec<NodeId>,
}

impl<S: GraphState> GraphResult<S> {
    /// Number of times a node ran
    pub fn visits(&self, id: &str) -> usize {
        self.steps.iter().filter(|s| s.as_str() == id).count()
    }
}

/// Validated, executable graph
pub struct CompiledGraph<S: GraphState> {
    name: String,
    nodes: HashMap<NodeId, BoxedNode<S>>,
    order: Vec<NodeId>,
    edges: HashMap<NodeId, Edge<S>>,
    entry_point: NodeId,
    config: GraphConfig,
}

impl<S: GraphState> std::fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("nodes", &self.order)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

impl<S: GraphState> CompiledGraph<S> {
    pub(crate) fn new(
        name: String,
        nodes: HashMap<NodeId, BoxedNode<S>>,
        order: Vec<NodeId>,
        edges: HashMap<NodeId, Edge<S>>,
        entry_point: NodeId,
        config: GraphConfig,
    ) -> Self {
        Self {
            name,
            nodes,
            order,
            edges,
            entry_point,
            config,
        }
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry node
    pub fn entry_point(&self) -> &NodeId {
        &self.entry_point
    }

    /// Node ids in registration order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Runtime configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Run the graph to completion
    ///
    /// Enforces the configured `workflow_timeout` - if the invocation takes
    /// longer than this duration, it returns a `WorkflowTimeout` error.
    pub async fn run(&self, initial_state: S) -> Result<GraphResult<S>, GraphError> {
        let workflow_timeout = self.config.workflow_timeout;

        match timeout(workflow_timeout, self.run_inner(initial_state)).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::WorkflowTimeout(workflow_timeout)),
        }
    }

    async fn run_inner(&self, initial_state: S) -> Result<GraphResult<S>, GraphError> {
        let mut state = initial_state;
        let mut steps = Vec::new();
        let mut current = self.entry_point.clone();

        loop {
            if steps.len() >= self.config.max_steps {
                return Err(GraphError::MaxStepsExceeded(steps.len()));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::DeadEnd(current.clone()))?;

            debug!(graph = %self.name, node = %current, step = steps.len(), "Executing node");
            let update = self.execute_node(node, &state).await?;
            state = state.apply_update(update);
            steps.push(current.clone());

            match self.next_node(&current, &state)? {
                Some(next) => current = next,
                None => break,
            }
        }

        debug!(graph = %self.name, steps = steps.len(), "Graph reached END");
        Ok(GraphResult { state, steps })
    }

    /// Execute a node with timeout and retry for recoverable failures
    ///
    /// Subgraph nodes run without `node_timeout`: the child graph bounds
    /// itself with its own per-node and workflow timeouts, and a whole
    /// child run is never restarted because it was slow.
    async fn execute_node(&self, node: &BoxedNode<S>, state: &S) -> Result<S::Update, GraphError> {
        let node_timeout = self.config.node_timeout;
        let policy = &self.config.retry_policy;
        let mut attempts = 0;

        loop {
            let result = if node.is_subgraph() {
                node.run(state).await
            } else {
                match timeout(node_timeout, node.run(state)).await {
                    Ok(result) => result,
                    Err(_) => Err(GraphError::NodeTimeout(node.id().clone())),
                }
            };

            match result {
                Ok(update) => return Ok(update),
                Err(e) if e.is_recoverable() => {
                    if policy.should_retry(attempts) {
                        let delay = policy.delay_for_attempt(attempts);
                        warn!(
                            node = %node.id(),
                            attempt = attempts + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Node failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempts += 1;
                    } else if attempts == 0 {
                        return Err(e);
                    } else {
                        return Err(GraphError::MaxRetriesExceeded {
                            node_id: node.id().clone(),
                            attempts: attempts + 1,
                            source: Box::new(e),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve the successor of a node; `None` means END
    fn next_node(&self, from: &NodeId, state: &S) -> Result<Option<NodeId>, GraphError> {
        let target = match self.edges.get(from) {
            Some(Edge::Direct(to)) => to.as_str(),
            Some(Edge::Conditional { router, branches }) => {
                let label = router(state);
                debug!(node = %from, label, "Routing decision");
                branches
                    .iter()
                    .find(|(l, _)| l == label)
                    .map(|(_, to)| to.as_str())
                    .ok_or_else(|| GraphError::routing_error(from, label))?
            }
            None => return Err(GraphError::DeadEnd(from.clone())),
        };

        if target == END {
            Ok(None)
        } else {
            Ok(Some(NodeId::from(target)))
        }
    }

    /// Render the graph as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        lines.push(render_terminal("__start__", "START"));
        for id in &self.order {
            if let Some(node) = self.nodes.get(id) {
                lines.push(render_node(id, node.is_subgraph()));
            }
        }
        lines.push(render_terminal("__end__", END));

        lines.push(render_edge("__start__", self.entry_point.as_str(), None));
        for id in &self.order {
            match self.edges.get(id) {
                Some(Edge::Direct(to)) => lines.push(render_edge(id.as_str(), to, None)),
                Some(Edge::Conditional { branches, .. }) => {
                    for (label, to) in branches {
                        lines.push(render_edge(id.as_str(), to, Some(label)));
                    }
                }
                None => {}
            }
        }
        lines.join("\n")
    }
}

// ============================================================================
// Mermaid rendering
// ============================================================================

/// Replace characters Mermaid does not accept in node identifiers
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn mermaid_id(id: &str) -> String {
    if id == END {
        "__end__".to_string()
    } else {
        sanitize_id(id)
    }
}

fn render_terminal(id: &str, label: &str) -> String {
    format!("    {}([{}])", id, label)
}

fn render_node(id: &NodeId, subgraph: bool) -> String {
    let safe_id = sanitize_id(id.as_str());
    if subgraph {
        format!("    {}[[{}]]", safe_id, id)
    } else {
        format!("    {}[{}]", safe_id, id)
    }
}

fn render_edge(from: &str, to: &str, label: Option<&str>) -> String {
    let from_id = if from == "__start__" {
        from.to_string()
    } else {
        mermaid_id(from)
    };
    match label {
        Some(label) => format!("    {} -. \"{}\" .-> {}", from_id, label, mermaid_id(to)),
        None => format!("    {} --> {}", from_id, mermaid_id(to)),
    }
}
