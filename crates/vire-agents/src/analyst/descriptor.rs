//! Analyst descriptors
//!
//! An analyst is a named bundle of permitted tools and prompt templates.
//! Tiers differ only in these values; the loop that runs them is shared.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::prompts;
use crate::tools::{ARXIV_TOOL, LLM_KNOWLEDGE_TOOL, OBJECT_ANALYSIS_TOOL, VQA_TOOL, WIKIPEDIA_TOOL};

/// Templates for each decision point of the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystPrompts {
    /// Decide the next tool or finish
    pub turn: String,
    /// Explain the answer from the gathered evidence
    pub rationale: String,
    /// Pick the final answer
    pub final_answer: String,
}

impl AnalystPrompts {
    pub fn new(
        turn: impl Into<String>,
        rationale: impl Into<String>,
        final_answer: impl Into<String>,
    ) -> Self {
        Self {
            turn: turn.into(),
            rationale: rationale.into(),
            final_answer: final_answer.into(),
        }
    }
}

/// Immutable capability bundle bound into one analyst loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyst {
    name: String,
    description: String,
    tools: Vec<String>,
    prompts: AnalystPrompts,
}

impl Analyst {
    pub fn new<I, T>(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: I,
        prompts: AnalystPrompts,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            tools: tools.into_iter().map(Into::into).collect(),
            prompts,
        }
    }

    /// Answers from VQA candidates alone
    pub fn junior() -> Self {
        Self::new(
            "Junior",
            "A junior analyst who uses only the vanilla VQA model to generate candidate answers.",
            [VQA_TOOL],
            AnalystPrompts::new(
                prompts::JUNIOR_TURN,
                prompts::JUNIOR_RATIONALE,
                prompts::JUNIOR_FINAL,
            ),
        )
    }

    /// Adds encyclopedic and academic lookups
    pub fn senior() -> Self {
        Self::new(
            "Senior",
            "A senior analyst who combines VQA candidates with Wikipedia and arXiv knowledge.",
            [VQA_TOOL, WIKIPEDIA_TOOL, ARXIV_TOOL],
            AnalystPrompts::new(
                prompts::SENIOR_TURN,
                prompts::SENIOR_RATIONALE,
                prompts::EVIDENCE_FINAL,
            ),
        )
    }

    /// Adds generated knowledge and object analysis
    pub fn manager() -> Self {
        Self::new(
            "Manager",
            "A manager analyst with access to all tools including LLM-based knowledge generation.",
            [VQA_TOOL, WIKIPEDIA_TOOL, LLM_KNOWLEDGE_TOOL, OBJECT_ANALYSIS_TOOL],
            AnalystPrompts::new(
                prompts::MANAGER_TURN,
                prompts::MANAGER_RATIONALE,
                prompts::EVIDENCE_FINAL,
            ),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Permitted tool names, in the order `[Action_N]` refers to them
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn prompts(&self) -> &AnalystPrompts {
        &self.prompts
    }

    pub fn permits(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }

    /// Node name of this analyst's subgraph in the pipeline
    pub fn node_name(&self) -> String {
        format!("{}_analyst", self.name.to_lowercase())
    }
}

/// Built-in analyst tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystTier {
    Junior,
    Senior,
    Manager,
}

impl AnalystTier {
    pub const ALL: [AnalystTier; 3] = [AnalystTier::Junior, AnalystTier::Senior, AnalystTier::Manager];

    pub fn analyst(&self) -> Analyst {
        match self {
            AnalystTier::Junior => Analyst::junior(),
            AnalystTier::Senior => Analyst::senior(),
            AnalystTier::Manager => Analyst::manager(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystTier::Junior => "junior",
            AnalystTier::Senior => "senior",
            AnalystTier::Manager => "manager",
        }
    }
}

impl fmt::Display for AnalystTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalystTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "junior" => Ok(AnalystTier::Junior),
            "senior" => Ok(AnalystTier::Senior),
            "manager" => Ok(AnalystTier::Manager),
            other => Err(format!(
                "unknown analyst tier '{other}' (expected junior, senior or manager)"
            )),
        }
    }
}
