//! In-memory collaborators shared by the scenario tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use vire_agents::graph::{GraphConfig, RetryPolicy};
use vire_agents::tools::{
    Candidate, DynTool, EvidenceSlot, KnowledgeSource, Tool, ToolDefinition, ToolError,
    ToolInput, ToolOutput,
};

/// Tool answering from a queue; the last answer repeats
pub struct FakeTool {
    name: String,
    slot: EvidenceSlot,
    outputs: Mutex<VecDeque<Result<ToolOutput, String>>>,
    last: Mutex<Option<Result<ToolOutput, String>>>,
    inputs: Mutex<Vec<ToolInput>>,
}

impl FakeTool {
    pub fn new(name: &str, slot: EvidenceSlot, outputs: Vec<Result<ToolOutput, String>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            slot,
            outputs: Mutex::new(outputs.into()),
            last: Mutex::new(None),
            inputs: Mutex::new(Vec::new()),
        })
    }

    /// VQA tool returning each candidate list in turn
    pub fn vqa(rounds: Vec<Vec<(&str, f64)>>) -> Arc<Self> {
        let outputs = rounds
            .into_iter()
            .map(|round| {
                Ok(ToolOutput::Candidates(
                    round.into_iter().map(|(l, c)| Candidate::new(l, c)).collect(),
                ))
            })
            .collect();
        Self::new("vqa_tool", EvidenceSlot::Candidates, outputs)
    }

    pub fn knowledge(name: &str, source: KnowledgeSource, text: &str) -> Arc<Self> {
        Self::new(
            name,
            EvidenceSlot::Knowledge(source),
            vec![Ok(ToolOutput::Text(text.to_string()))],
        )
    }

    pub fn failing(name: &str, source: KnowledgeSource) -> Arc<Self> {
        Self::new(name, EvidenceSlot::Knowledge(source), vec![Err("503".to_string())])
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<ToolInput> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn dyn_tool(self: &Arc<Self>) -> DynTool {
        self.clone()
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: format!("fake {}", self.name),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    fn slot(&self) -> EvidenceSlot {
        self.slot
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        self.inputs.lock().unwrap().push(input.clone());
        let next = self.outputs.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        let result = match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last.clone().unwrap_or_else(|| Err("no output".to_string())),
        };
        result.map_err(|body| ToolError::Server { status: 503, body })
    }
}

/// Fast retries so failure tests stay quick
pub fn fast_graph_config() -> GraphConfig {
    GraphConfig::default().with_retry_policy(
        RetryPolicy::new(2).with_backoff_base(std::time::Duration::from_millis(1)),
    )
}
