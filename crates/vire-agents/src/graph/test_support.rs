//! Shared fixtures for graph runtime tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::error::GraphError;
use super::node::{Node, NodeId};
use super::state::{GraphState, StateUpdate};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterState {
    pub count: i32,
    pub visited: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CounterUpdate {
    pub delta: i32,
    pub visited: Option<String>,
}

impl CounterUpdate {
    pub fn visit(node: &str, delta: i32) -> Self {
        Self {
            delta,
            visited: Some(node.to_string()),
        }
    }
}

impl StateUpdate for CounterUpdate {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        self.delta == 0 && self.visited.is_none()
    }
}

impl GraphState for CounterState {
    type Update = CounterUpdate;

    fn apply_update(&self, update: Self::Update) -> Self {
        let mut next = self.clone();
        next.count += update.delta;
        next.visited.extend(update.visited);
        next
    }
}

/// Node that adds one to the counter and records its visit
pub struct StepNode {
    id: NodeId,
}

pub fn step(id: &str) -> StepNode {
    StepNode { id: NodeId::from(id) }
}

#[async_trait]
impl Node<CounterState> for StepNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, _state: &CounterState) -> Result<CounterUpdate, GraphError> {
        Ok(CounterUpdate::visit(self.id.as_str(), 1))
    }
}

/// Node that fails a fixed number of times before succeeding
pub struct FlakyNode {
    id: NodeId,
    failures: usize,
    fatal: bool,
    pub calls: Arc<AtomicUsize>,
}

impl FlakyNode {
    pub fn new(id: &str, failures: usize) -> Self {
        Self {
            id: NodeId::from(id),
            failures,
            fatal: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

#[async_trait]
impl Node<CounterState> for FlakyNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, _state: &CounterState) -> Result<CounterUpdate, GraphError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            if self.fatal {
                return Err(GraphError::aborted(
                    self.id.clone(),
                    std::io::Error::other("invariant broken"),
                ));
            }
            return Err(GraphError::node_error(self.id.clone(), "transient"));
        }
        Ok(CounterUpdate::visit(self.id.as_str(), 1))
    }
}

/// Node that sleeps longer than any sensible test timeout
pub struct SlowNode {
    id: NodeId,
}

impl SlowNode {
    pub fn new(id: &str) -> Self {
        Self { id: NodeId::from(id) }
    }
}

#[async_trait]
impl Node<CounterState> for SlowNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, _state: &CounterState) -> Result<CounterUpdate, GraphError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(CounterUpdate::visit(self.id.as_str(), 1))
    }
}
