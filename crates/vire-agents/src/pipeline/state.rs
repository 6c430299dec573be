//! Top-level workflow state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::{GraphState, StateUpdate};
use crate::llm::TokenUsage;
use crate::vision::ImageRef;

/// Analyst name → text
pub type AnalystEntry = BTreeMap<String, String>;

/// State of one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub question: String,
    pub image: ImageRef,
    /// Set once by the caption node
    pub image_caption: Option<String>,
    pub results: Vec<AnalystEntry>,
    pub rationales: Vec<AnalystEntry>,
    pub final_answer: String,
    pub explanation: String,
    /// Tokens spent across all analysts
    pub usage: TokenUsage,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, image: ImageRef) -> Self {
        Self {
            question: question.into(),
            image,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowUpdate {
    pub image_caption: Option<String>,
    pub results: Vec<AnalystEntry>,
    pub rationales: Vec<AnalystEntry>,
    pub final_answer: Option<String>,
    pub explanation: Option<String>,
    pub usage: TokenUsage,
}

impl WorkflowUpdate {
    pub fn caption(caption: impl Into<String>) -> Self {
        Self {
            image_caption: Some(caption.into()),
            ..Default::default()
        }
    }

    /// One analyst's projected output
    pub fn analyst_output(analyst: &str, answer: String, rationale: String) -> Self {
        Self {
            results: vec![BTreeMap::from([(analyst.to_string(), answer)])],
            rationales: vec![BTreeMap::from([(analyst.to_string(), rationale)])],
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn answer(final_answer: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            final_answer: Some(final_answer.into()),
            explanation: Some(explanation.into()),
            ..Default::default()
        }
    }
}

impl StateUpdate for WorkflowUpdate {
    fn empty() -> Self {
        Self::default()
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl GraphState for WorkflowState {
    type Update = WorkflowUpdate;

    fn apply_update(&self, update: WorkflowUpdate) -> Self {
        let mut next = self.clone();

        if let Some(caption) = update.image_caption {
            if next.image_caption.is_some() {
                warn!("Image caption already set, ignoring second write");
            } else {
                next.image_caption = Some(caption);
            }
        }
        next.results.extend(update.results);
        next.rationales.extend(update.rationales);
        next.usage += update.usage;
        if let Some(answer) = update.final_answer {
            next.final_answer = answer;
        }
        if let Some(explanation) = update.explanation {
            next.explanation = explanation;
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_is_immutable() {
        let state = WorkflowState::new("q", ImageRef::default())
            .apply_update(WorkflowUpdate::caption("a dog"))
            .apply_update(WorkflowUpdate::caption("a cat"));
        assert_eq!(state.image_caption.as_deref(), Some("a dog"));
    }

    #[test]
    fn test_results_append_and_answer_replaces() {
        let state = WorkflowState::default()
            .apply_update(WorkflowUpdate::analyst_output("Junior", "cat".into(), "whiskers".into()))
            .apply_update(WorkflowUpdate::analyst_output("Manager", "lynx".into(), "tufted ears".into()))
            .apply_update(WorkflowUpdate::answer("cat", "whiskers"))
            .apply_update(WorkflowUpdate::answer("lynx", "tufted ears"));

        assert_eq!(state.results.len(), 2);
        assert_eq!(state.results[0]["Junior"], "cat");
        assert_eq!(state.rationales[1]["Manager"], "tufted ears");
        assert_eq!(state.final_answer, "lynx");
        assert_eq!(state.explanation, "tufted ears");
    }

    #[test]
    fn test_usage_sums_over_analysts() {
        let state = WorkflowState::default()
            .apply_update(
                WorkflowUpdate::analyst_output("Junior", "cat".into(), "whiskers".into())
                    .with_usage(TokenUsage::new(500, 40)),
            )
            .apply_update(
                WorkflowUpdate::analyst_output("Manager", "lynx".into(), "ears".into())
                    .with_usage(TokenUsage::new(900, 60)),
            );
        assert_eq!(state.usage, TokenUsage::new(1400, 100));
    }

    #[test]
    fn test_empty_update() {
        let state = WorkflowState::new("q", ImageRef::from("x.jpg"));
        assert!(WorkflowUpdate::empty().is_empty());
        assert_eq!(state.apply_update(WorkflowUpdate::empty()), state);
    }
}
