//! StateGraph builder DSL.
//!
//! Provides a fluent API for registering nodes, fixed edges, conditional
//! edges, and the entry point, then validates the wiring and compiles it
//! into a [`CompiledGraph`].

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::compiled::CompiledGraph;
use super::config::GraphConfig;
use super::node::{BoxedNode, Node, NodeId};
use super::state::GraphState;

/// Sentinel target for terminal edges.
pub const END: &str = "END";

/// Router deciding a branch label from the current state
pub type Router<S> = Arc<dyn Fn(&S) -> &'static str + Send + Sync>;

/// Outgoing edge of a node
pub(crate) enum Edge<S> {
    /// Always go to the target
    Direct(String),
    /// Ask the router for a label and follow the matching branch
    Conditional {
        router: Router<S>,
        branches: Vec<(String, String)>,
    },
}

impl<S> Edge<S> {
    pub(crate) fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional { branches, .. } => {
                branches.iter().map(|(_, to)| to.as_str()).collect()
            }
        }
    }
}

/// Errors that can occur while building a graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphBuildError {
    #[error("graph entry point not set")]
    NoEntryPoint,
    #[error("unknown node id: {0}")]
    UnknownNode(String),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("node '{0}' already has an outgoing edge")]
    DuplicateEdge(String),
    #[error("node '{0}' has no outgoing edge")]
    MissingEdge(String),
    #[error("'{0}' is reserved")]
    ReservedName(String),
    #[error("conditional edge from '{0}' has no branches")]
    EmptyBranches(String),
}

/// Builder for constructing state graphs with fluent API.
pub struct StateGraph<S: GraphState> {
    name: String,
    nodes: Vec<BoxedNode<S>>,
    edges: Vec<(String, Edge<S>)>,
    entry_point: Option<String>,
    config: GraphConfig,
}

impl<S: GraphState> StateGraph<S> {
    /// Create a new graph builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry_point: None,
            config: GraphConfig::default(),
        }
    }

    /// Add a node.
    pub fn node(self, node: impl Node<S> + 'static) -> Self {
        self.boxed_node(Arc::new(node))
    }

    /// Add an already shared node.
    pub fn boxed_node(mut self, node: BoxedNode<S>) -> Self {
        self.nodes.push(node);
        self
    }

    /// Set the entry point node.
    pub fn entry(mut self, id: impl Into<String>) -> Self {
        self.entry_point = Some(id.into());
        self
    }

    /// Add a direct edge between nodes.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Direct(to.into())));
        self
    }

    /// Add conditional edges from a node.
    ///
    /// The router's label selects one of the `(label, target)` branches.
    pub fn conditional_edges<R>(
        mut self,
        from: impl Into<String>,
        router: R,
        branches: Vec<(&str, &str)>,
    ) -> Self
    where
        R: Fn(&S) -> &'static str + Send + Sync + 'static,
    {
        let branches = branches
            .into_iter()
            .map(|(label, target)| (label.to_string(), target.to_string()))
            .collect();
        self.edges.push((
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                branches,
            },
        ));
        self
    }

    /// Set the runtime configuration.
    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and compile the graph.
    pub fn build(self) -> Result<CompiledGraph<S>, GraphBuildError> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut nodes: HashMap<NodeId, BoxedNode<S>> = HashMap::new();
        for node in self.nodes {
            let id = node.id().clone();
            if id.as_str() == END {
                return Err(GraphBuildError::ReservedName(END.to_string()));
            }
            if nodes.contains_key(&id) {
                return Err(GraphBuildError::DuplicateNode(id.0));
            }
            order.push(id.clone());
            nodes.insert(id, node);
        }

        let entry_point = NodeId::new(self.entry_point.ok_or(GraphBuildError::NoEntryPoint)?);
        if !nodes.contains_key(&entry_point) {
            return Err(GraphBuildError::UnknownNode(entry_point.0));
        }

        let mut edges: HashMap<NodeId, Edge<S>> = HashMap::new();
        for (from, edge) in self.edges {
            let from = NodeId::new(from);
            if !nodes.contains_key(&from) {
                return Err(GraphBuildError::UnknownNode(from.0));
            }
            if let Edge::Conditional { branches, .. } = &edge {
                if branches.is_empty() {
                    return Err(GraphBuildError::EmptyBranches(from.0));
                }
            }
            for target in edge.targets() {
                if target != END && !nodes.contains_key(&NodeId::from(target)) {
                    return Err(GraphBuildError::UnknownNode(target.to_string()));
                }
            }
            if edges.contains_key(&from) {
                return Err(GraphBuildError::DuplicateEdge(from.0));
            }
            edges.insert(from, edge);
        }

        if let Some(missing) = order.iter().find(|id| !edges.contains_key(*id)) {
            return Err(GraphBuildError::MissingEdge(missing.0.clone()));
        }

        Ok(CompiledGraph::new(
            self.name,
            nodes,
            order,
            edges,
            entry_point,
            self.config,
        ))
    }
}
