//! Analyst loop state and its merge contract
//!
//! | Field | Merge |
//! |---|---|
//! | `pending`, `candidates` | replace when present |
//! | `knowledge` | `Found` overwrites; `Failed` only fills a buffer without a result |
//! | `tool_calls`, `usage` | add |
//! | `called_tools`, `diagnostics` | append |
//! | `rationale`, `final_answer` | set once |

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::decision::ToolRequest;
use crate::graph::{GraphState, StateUpdate};
use crate::llm::TokenUsage;
use crate::tools::{Candidate, KnowledgeSource};
use crate::vision::ImageRef;

/// Content of one knowledge buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum KnowledgeEntry {
    /// Latest successful tool output
    Found(String),
    /// Diagnostic marker left by a failed call
    Failed(String),
}

impl KnowledgeEntry {
    pub fn text(&self) -> &str {
        match self {
            KnowledgeEntry::Found(text) | KnowledgeEntry::Failed(text) => text,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, KnowledgeEntry::Found(_))
    }
}

/// Working state of one analyst run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalystLoopState {
    pub analyst: String,
    pub question: String,
    /// Image caption
    pub context: String,
    pub image: ImageRef,
    /// Completed dispatch rounds
    pub tool_calls: usize,
    pub candidates: Vec<Candidate>,
    pub knowledge: BTreeMap<KnowledgeSource, KnowledgeEntry>,
    pub pending: Vec<ToolRequest>,
    pub called_tools: Vec<String>,
    pub diagnostics: Vec<String>,
    pub rationale: Option<String>,
    pub final_answer: Option<String>,
    /// Tokens spent by this analyst's model calls
    pub usage: TokenUsage,
}

impl AnalystLoopState {
    pub fn new(
        analyst: impl Into<String>,
        question: impl Into<String>,
        context: impl Into<String>,
        image: ImageRef,
    ) -> Self {
        Self {
            analyst: analyst.into(),
            question: question.into(),
            context: context.into(),
            image,
            ..Default::default()
        }
    }

    /// Buffer text, including failure markers
    pub fn knowledge_text(&self, source: KnowledgeSource) -> Option<&str> {
        self.knowledge.get(&source).map(KnowledgeEntry::text)
    }

    /// Buffer text, successful results only
    pub fn found(&self, source: KnowledgeSource) -> Option<&str> {
        self.knowledge
            .get(&source)
            .filter(|entry| entry.is_found())
            .map(KnowledgeEntry::text)
    }
}

/// Partial update returned by the loop nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalystUpdate {
    pub pending: Option<Vec<ToolRequest>>,
    pub candidates: Option<Vec<Candidate>>,
    pub knowledge: Vec<(KnowledgeSource, KnowledgeEntry)>,
    pub tool_calls: usize,
    pub called_tools: Vec<String>,
    pub diagnostics: Vec<String>,
    pub rationale: Option<String>,
    pub final_answer: Option<String>,
    pub usage: TokenUsage,
}

impl AnalystUpdate {
    /// Replace the pending requests
    pub fn pending(requests: Vec<ToolRequest>) -> Self {
        Self {
            pending: Some(requests),
            ..Default::default()
        }
    }

    pub fn rationale(text: impl Into<String>) -> Self {
        Self {
            rationale: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            final_answer: Some(text.into()),
            ..Default::default()
        }
    }

    /// Attach the tokens spent producing this update
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

impl StateUpdate for AnalystUpdate {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn set_once(slot: &mut Option<String>, value: Option<String>, field: &str, analyst: &str) {
    let Some(value) = value else { return };
    if slot.is_some() {
        warn!(analyst, field, "Field already set, ignoring second write");
        return;
    }
    *slot = Some(value);
}

impl GraphState for AnalystLoopState {
    type Update = AnalystUpdate;

    fn apply_update(&self, update: AnalystUpdate) -> Self {
        let mut next = self.clone();

        if let Some(pending) = update.pending {
            next.pending = pending;
        }
        if let Some(candidates) = update.candidates {
            next.candidates = candidates;
        }
        for (source, entry) in update.knowledge {
            let keep_existing = !entry.is_found()
                && next.knowledge.get(&source).is_some_and(KnowledgeEntry::is_found);
            if !keep_existing {
                next.knowledge.insert(source, entry);
            }
        }
        next.tool_calls += update.tool_calls;
        next.usage += update.usage;
        next.called_tools.extend(update.called_tools);
        next.diagnostics.extend(update.diagnostics);
        set_once(&mut next.rationale, update.rationale, "rationale", &self.analyst);
        set_once(&mut next.final_answer, update.final_answer, "final_answer", &self.analyst);

        next
    }
}

/// Loop limits, independent of the analyst
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystLoopConfig {
    /// Dispatch rounds before synthesis is forced
    pub max_tool_calls: usize,

    /// Deadline for a single tool call
    #[serde(with = "humantime_serde")]
    pub tool_timeout: Duration,
}

impl Default for AnalystLoopConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 5,
            tool_timeout: Duration::from_secs(60),
        }
    }
}

impl AnalystLoopConfig {
    pub fn with_max_tool_calls(mut self, max: usize) -> Self {
        self.max_tool_calls = max;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }
}
