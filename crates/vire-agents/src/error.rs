//! Top-level error type returned by analyst and pipeline entry points

use std::error::Error as StdError;

use thiserror::Error;

use crate::graph::{GraphBuildError, GraphError};

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model asked for a tool the analyst may not use
    #[error("Analyst {analyst} requested tool '{tool}' outside its permitted set")]
    PermissionViolation { analyst: String, tool: String },

    /// A permitted tool is not registered
    #[error("Analyst {analyst} is permitted tool '{tool}' but no such tool is registered")]
    MissingTool { analyst: String, tool: String },

    #[error("Graph build failed: {0}")]
    Build(#[from] GraphBuildError),

    #[error("Graph execution failed: {0}")]
    Graph(#[source] GraphError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AgentError {
    pub fn permission_violation(analyst: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::PermissionViolation {
            analyst: analyst.into(),
            tool: tool.into(),
        }
    }

    /// Whether the failure came from the model breaking the tool contract
    pub fn is_permission_violation(&self) -> bool {
        matches!(self, AgentError::PermissionViolation { .. })
    }
}

impl From<GraphError> for AgentError {
    /// Surfaces a permission violation buried in the graph error's source
    /// chain; everything else stays a graph error.
    fn from(err: GraphError) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(&err);
        while let Some(e) = current {
            if let Some(AgentError::PermissionViolation { analyst, tool }) =
                e.downcast_ref::<AgentError>()
            {
                return AgentError::permission_violation(analyst.clone(), tool.clone());
            }
            current = e.source();
        }
        AgentError::Graph(err)
    }
}
