//! The four nodes of an analyst loop
//!
//! `agent` picks the next tool, `tools` runs it, `rationale` explains the
//! gathered evidence and `final_reasoning` commits to an answer.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::decision::{decide, strip_think, AgentAction};
use super::descriptor::Analyst;
use super::prompts::{format_candidates, format_list, render, NONE};
use super::state::{AnalystLoopConfig, AnalystLoopState, AnalystUpdate, KnowledgeEntry};
use crate::error::AgentError;
use crate::graph::{GraphError, Node, NodeId};
use crate::llm::{LLMProvider, LLMResponse, Message, TokenUsage};
use crate::tools::{
    EvidenceSlot, KnowledgeSource, ToolDefinition, ToolError, ToolInput, ToolOutput,
    ToolRegistry,
};

pub const AGENT_NODE: &str = "agent";
pub const TOOLS_NODE: &str = "tools";
pub const RATIONALE_NODE: &str = "rationale";
pub const FINAL_NODE: &str = "final_reasoning";

static ANSWER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)answer\s*:").expect("valid answer pattern"));

/// Template variables describing the evidence gathered so far
///
/// With `with_failures`, buffers holding only a failure marker show the
/// marker; otherwise they show as `None`.
fn evidence_vars(state: &AnalystLoopState, with_failures: bool) -> Vec<(&'static str, String)> {
    let buffer = |source: KnowledgeSource| {
        if with_failures {
            state.knowledge_text(source)
        } else {
            state.found(source)
        }
    };
    let kbs: Vec<&str> = [KnowledgeSource::Encyclopedic, KnowledgeSource::Academic]
        .into_iter()
        .filter_map(buffer)
        .collect();
    let or_none = |text: Option<&str>| text.unwrap_or(NONE).to_string();

    vec![
        ("question", state.question.clone()),
        ("context", state.context.clone()),
        ("candidates", format_candidates(&state.candidates)),
        (
            "kbs_knowledge",
            if kbs.is_empty() { NONE.to_string() } else { kbs.join("\n") },
        ),
        ("llm_knowledge", or_none(buffer(KnowledgeSource::Generated))),
        ("object_analysis", or_none(buffer(KnowledgeSource::ObjectAnalysis))),
        ("tool_calls", state.tool_calls.to_string()),
        ("called_tools", format_list(&state.called_tools)),
        ("diagnostics", format_list(&state.diagnostics)),
    ]
}

fn render_vars(template: &str, vars: &[(&'static str, String)]) -> String {
    let refs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
    render(template, &refs)
}

/// Tokens reported for one completion; providers that report none count as zero
fn usage_of(response: &LLMResponse, node: &NodeId, analyst: &str) -> TokenUsage {
    match &response.usage {
        Some(usage) => {
            debug!(
                node = %node,
                analyst,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Token usage"
            );
            usage.clone()
        }
        None => TokenUsage::default(),
    }
}

/// Answer after the last `Answer:` marker, else the first non-empty line
pub fn extract_answer(completion: &str) -> String {
    let text = strip_think(completion);
    let clean = |s: &str| {
        s.trim()
            .trim_matches(|c| matches!(c, '*' | '"' | '`'))
            .trim()
            .to_string()
    };

    if let Some(marker) = ANSWER_MARKER.find_iter(&text).last() {
        let after = &text[marker.end()..];
        if let Some(line) = after.lines().map(clean).find(|l| !l.is_empty()) {
            return line;
        }
    }
    text.lines().map(clean).find(|l| !l.is_empty()).unwrap_or_default()
}

/// Asks the model for the next action and records it as `pending`
pub struct TurnNode {
    id: NodeId,
    analyst: Arc<Analyst>,
    llm: Arc<dyn LLMProvider>,
    definitions: Vec<ToolDefinition>,
}

impl TurnNode {
    pub fn new(
        analyst: Arc<Analyst>,
        llm: Arc<dyn LLMProvider>,
        definitions: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            id: NodeId::from(AGENT_NODE),
            analyst,
            llm,
            definitions,
        }
    }
}

#[async_trait]
impl Node<AnalystLoopState> for TurnNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &AnalystLoopState) -> Result<AnalystUpdate, GraphError> {
        let prompt = render_vars(&self.analyst.prompts().turn, &evidence_vars(state, true));
        debug!(node = %self.id, analyst = %self.analyst.name(), prompt = %prompt, "Turn prompt");

        let response = self
            .llm
            .complete(&[Message::user(&prompt)], &self.definitions, None)
            .await
            .map_err(|e| GraphError::node_error_with_source(&self.id, "turn completion failed", e))?;
        let usage = usage_of(&response, &self.id, self.analyst.name());

        match decide(&response, self.analyst.tools()) {
            AgentAction::Done => {
                info!(
                    node = %self.id,
                    analyst = %self.analyst.name(),
                    tool_calls = state.tool_calls,
                    "Analyst finished gathering evidence"
                );
                Ok(AnalystUpdate::pending(Vec::new()).with_usage(usage))
            }
            AgentAction::ToolRequest(request) if !self.analyst.permits(&request.name) => {
                Err(GraphError::aborted(
                    &self.id,
                    AgentError::permission_violation(self.analyst.name(), request.name),
                ))
            }
            AgentAction::ToolRequest(request) => {
                info!(
                    node = %self.id,
                    analyst = %self.analyst.name(),
                    tool = %request.name,
                    "Analyst requested tool"
                );
                Ok(AnalystUpdate::pending(vec![request]).with_usage(usage))
            }
        }
    }
}

/// Runs pending tool requests and merges their evidence
pub struct DispatchNode {
    id: NodeId,
    analyst: Arc<Analyst>,
    tools: ToolRegistry,
    config: AnalystLoopConfig,
}

impl DispatchNode {
    /// `tools` must be the analyst's permitted view of the registry
    pub fn new(analyst: Arc<Analyst>, tools: ToolRegistry, config: AnalystLoopConfig) -> Self {
        Self {
            id: NodeId::from(TOOLS_NODE),
            analyst,
            tools,
            config,
        }
    }
}

#[async_trait]
impl Node<AnalystLoopState> for DispatchNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &AnalystLoopState) -> Result<AnalystUpdate, GraphError> {
        if state.pending.is_empty() {
            debug!(node = %self.id, "Nothing pending");
            return Ok(AnalystUpdate::pending(Vec::new()));
        }

        let mut update = AnalystUpdate {
            pending: Some(Vec::new()),
            tool_calls: 1,
            ..Default::default()
        };

        for request in &state.pending {
            let tool = self.tools.get(&request.name).ok_or_else(|| {
                GraphError::aborted(
                    &self.id,
                    AgentError::permission_violation(self.analyst.name(), &request.name),
                )
            })?;

            let input = ToolInput {
                args: request.args.clone(),
                question: state.question.clone(),
                context: state.context.clone(),
                image: state.image.clone(),
            };
            let slot = tool.slot();
            let outcome = match timeout(self.config.tool_timeout, tool.execute(&input)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout(self.config.tool_timeout)),
            };
            update.called_tools.push(request.name.clone());

            let merged = outcome.and_then(|output| match (slot, output) {
                (EvidenceSlot::Candidates, ToolOutput::Candidates(candidates)) => {
                    update.candidates = Some(candidates);
                    Ok(())
                }
                (EvidenceSlot::Candidates, ToolOutput::Text(_)) => Err(
                    ToolError::InvalidResponse("expected answer candidates".to_string()),
                ),
                (EvidenceSlot::Knowledge(source), output) => {
                    let text = match output {
                        ToolOutput::Text(text) => text,
                        ToolOutput::Candidates(candidates) => format_candidates(&candidates),
                    };
                    update.knowledge.push((source, KnowledgeEntry::Found(text)));
                    Ok(())
                }
            });

            match merged {
                Ok(()) => info!(
                    node = %self.id,
                    analyst = %self.analyst.name(),
                    tool = %request.name,
                    "Tool evidence merged"
                ),
                Err(e) => {
                    let marker = format!("{} failed: {}", request.name, e);
                    warn!(
                        node = %self.id,
                        analyst = %self.analyst.name(),
                        tool = %request.name,
                        error = %e,
                        "Tool dispatch failed"
                    );
                    if let EvidenceSlot::Knowledge(source) = slot {
                        update
                            .knowledge
                            .push((source, KnowledgeEntry::Failed(marker.clone())));
                    }
                    update.diagnostics.push(marker);
                }
            }
        }

        Ok(update)
    }
}

/// Writes the rationale from the fused evidence
pub struct RationaleNode {
    id: NodeId,
    analyst: Arc<Analyst>,
    llm: Arc<dyn LLMProvider>,
}

impl RationaleNode {
    pub fn new(analyst: Arc<Analyst>, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            id: NodeId::from(RATIONALE_NODE),
            analyst,
            llm,
        }
    }
}

#[async_trait]
impl Node<AnalystLoopState> for RationaleNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &AnalystLoopState) -> Result<AnalystUpdate, GraphError> {
        let prompt = render_vars(&self.analyst.prompts().rationale, &evidence_vars(state, false));
        debug!(node = %self.id, analyst = %self.analyst.name(), prompt = %prompt, "Rationale prompt");

        let response = self
            .llm
            .complete(&[Message::user(&prompt)], &[], None)
            .await
            .map_err(|e| {
                GraphError::node_error_with_source(&self.id, "rationale completion failed", e)
            })?;

        let usage = usage_of(&response, &self.id, self.analyst.name());
        let rationale = strip_think(response.content());
        info!(
            node = %self.id,
            analyst = %self.analyst.name(),
            chars = rationale.len(),
            "Rationale synthesized"
        );
        // a request left over when the ceiling forced synthesis is dropped
        Ok(AnalystUpdate {
            pending: Some(Vec::new()),
            ..AnalystUpdate::rationale(rationale).with_usage(usage)
        })
    }
}

/// Commits to one answer, preferring the rationale over the ranking
pub struct FinalReasoningNode {
    id: NodeId,
    analyst: Arc<Analyst>,
    llm: Arc<dyn LLMProvider>,
}

impl FinalReasoningNode {
    pub fn new(analyst: Arc<Analyst>, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            id: NodeId::from(FINAL_NODE),
            analyst,
            llm,
        }
    }
}

#[async_trait]
impl Node<AnalystLoopState> for FinalReasoningNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &AnalystLoopState) -> Result<AnalystUpdate, GraphError> {
        let mut vars = evidence_vars(state, false);
        vars.push(("rationale", state.rationale.clone().unwrap_or_default()));
        let prompt = render_vars(&self.analyst.prompts().final_answer, &vars);

        let response = self
            .llm
            .complete(&[Message::user(&prompt)], &[], None)
            .await
            .map_err(|e| GraphError::node_error_with_source(&self.id, "final completion failed", e))?;

        let usage = usage_of(&response, &self.id, self.analyst.name());
        let answer = extract_answer(response.content());
        info!(
            node = %self.id,
            analyst = %self.analyst.name(),
            answer = %answer,
            "Final answer selected"
        );
        Ok(AnalystUpdate::final_answer(answer).with_usage(usage))
    }
}
