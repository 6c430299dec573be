//! # Configuration Module
//!
//! Loads service endpoints and loop limits from the environment (and an
//! optional `.env` file), then assembles a ready-to-run [`Pipeline`].

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use vire_agents::graph::GraphConfig;
use vire_agents::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use vire_agents::llm::OpenAICompatibleProvider;
use vire_agents::tools::{
    ArxivTool, LlmKnowledgeTool, ObjectAnalysisTool, RateLimiter, ToolRegistry, VqaTool,
    WikipediaTool, DEFAULT_ARXIV_BASE_URL, DEFAULT_KNOWLEDGE_BASE_URL, DEFAULT_KNOWLEDGE_MODEL,
    DEFAULT_SEARCH_DELAY, DEFAULT_WIKIPEDIA_BASE_URL,
};
use vire_agents::vision::{HttpCaptioner, DEFAULT_VISION_BASE_URL};
use vire_agents::{AnalystLoopConfig, AnalystTier, Pipeline, PipelineBuilder};

// =============================================================================
// TIER SELECTION
// =============================================================================
/// Which analysts a pipeline runs: one tier, or every tier in turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSelection {
    Single(AnalystTier),
    /// Junior, then Senior, then Manager; the Manager's answer wins
    All,
}

impl TierSelection {
    pub fn tiers(self) -> Vec<AnalystTier> {
        match self {
            TierSelection::Single(tier) => vec![tier],
            TierSelection::All => AnalystTier::ALL.to_vec(),
        }
    }
}

impl FromStr for TierSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "full" => Ok(TierSelection::All),
            other => other
                .parse::<AnalystTier>()
                .map(TierSelection::Single)
                .map_err(|_| format!("unknown tier '{s}' (expected junior, senior, manager or all)")),
        }
    }
}

impl fmt::Display for TierSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierSelection::Single(tier) => write!(f, "{tier}"),
            TierSelection::All => f.write_str("all"),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Runtime configuration for the VQA pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI-compatible endpoint serving the analyst model
    pub llm_base_url: String,

    /// Analyst model name
    pub llm_model: String,

    /// Bearer key for the analyst endpoint, if it needs one
    pub llm_api_key: Option<String>,

    /// Analyst sampling temperature
    pub temperature: f64,

    /// Endpoint and model behind the `llm_knowledge` tool
    pub knowledge_base_url: String,
    pub knowledge_model: String,

    /// Vision service (captioning, VQA candidates, object analysis)
    pub vision_base_url: String,

    pub wikipedia_base_url: String,
    pub arxiv_base_url: String,

    /// Minimum spacing between calls to the same search backend
    pub search_delay: Duration,

    /// Dispatch rounds before the analyst must synthesize
    pub max_tool_calls: usize,

    /// Deadline for one tool call
    pub tool_timeout: Duration,

    /// Deadline for one graph node (analyst loops are bounded per node instead)
    pub node_timeout: Duration,

    /// Deadline for a whole graph run
    pub workflow_timeout: Duration,

    /// Where experiment result files are written
    pub results_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let loop_defaults = AnalystLoopConfig::default();
        let graph_defaults = GraphConfig::default();
        Self {
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_api_key: None,
            temperature: 0.0,
            knowledge_base_url: DEFAULT_KNOWLEDGE_BASE_URL.to_string(),
            knowledge_model: DEFAULT_KNOWLEDGE_MODEL.to_string(),
            vision_base_url: DEFAULT_VISION_BASE_URL.to_string(),
            wikipedia_base_url: DEFAULT_WIKIPEDIA_BASE_URL.to_string(),
            arxiv_base_url: DEFAULT_ARXIV_BASE_URL.to_string(),
            search_delay: DEFAULT_SEARCH_DELAY,
            max_tool_calls: loop_defaults.max_tool_calls,
            tool_timeout: loop_defaults.tool_timeout,
            node_timeout: graph_defaults.node_timeout,
            workflow_timeout: graph_defaults.workflow_timeout,
            results_dir: PathBuf::from("results"),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("VIRE_LLM_BASE_URL") {
            config.llm_base_url = val;
        }
        if let Some(val) = lookup("VIRE_LLM_MODEL") {
            config.llm_model = val;
        }
        config.llm_api_key = lookup("VIRE_LLM_API_KEY").filter(|key| !key.is_empty());
        if let Some(val) = lookup("VIRE_TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("VIRE_TEMPERATURE must be a floating-point number (e.g., 0.0)")?;
        }

        if let Some(val) = lookup("VIRE_KNOWLEDGE_BASE_URL") {
            config.knowledge_base_url = val;
        }
        if let Some(val) = lookup("VIRE_KNOWLEDGE_MODEL") {
            config.knowledge_model = val;
        }
        if let Some(val) = lookup("VIRE_VISION_BASE_URL") {
            config.vision_base_url = val;
        }
        if let Some(val) = lookup("VIRE_WIKIPEDIA_BASE_URL") {
            config.wikipedia_base_url = val;
        }
        if let Some(val) = lookup("VIRE_ARXIV_BASE_URL") {
            config.arxiv_base_url = val;
        }

        if let Some(val) = lookup("VIRE_SEARCH_DELAY") {
            config.search_delay = parse_seconds(&val)
                .context("VIRE_SEARCH_DELAY must be a number of seconds (e.g., 3 or 0.5)")?;
        }
        if let Some(val) = lookup("VIRE_MAX_TOOL_CALLS") {
            config.max_tool_calls = val
                .parse()
                .context("VIRE_MAX_TOOL_CALLS must be a non-negative integer")?;
        }
        if let Some(val) = lookup("VIRE_TOOL_TIMEOUT") {
            config.tool_timeout = parse_seconds(&val)
                .context("VIRE_TOOL_TIMEOUT must be a number of seconds (e.g., 60)")?;
        }
        if let Some(val) = lookup("VIRE_NODE_TIMEOUT") {
            config.node_timeout = parse_seconds(&val)
                .context("VIRE_NODE_TIMEOUT must be a number of seconds (e.g., 300)")?;
        }
        if let Some(val) = lookup("VIRE_WORKFLOW_TIMEOUT") {
            config.workflow_timeout = parse_seconds(&val)
                .context("VIRE_WORKFLOW_TIMEOUT must be a number of seconds (e.g., 3600)")?;
        }
        if let Some(val) = lookup("VIRE_RESULTS_DIR") {
            config.results_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.llm_model.trim().is_empty() {
            anyhow::bail!("VIRE_LLM_MODEL cannot be empty");
        }

        if self.knowledge_model.trim().is_empty() {
            anyhow::bail!("VIRE_KNOWLEDGE_MODEL cannot be empty");
        }

        for (name, url) in [
            ("VIRE_LLM_BASE_URL", &self.llm_base_url),
            ("VIRE_KNOWLEDGE_BASE_URL", &self.knowledge_base_url),
            ("VIRE_VISION_BASE_URL", &self.vision_base_url),
            ("VIRE_WIKIPEDIA_BASE_URL", &self.wikipedia_base_url),
            ("VIRE_ARXIV_BASE_URL", &self.arxiv_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{name} must be an http(s) URL, got: {url}");
            }
        }

        for (name, value) in [
            ("VIRE_TOOL_TIMEOUT", self.tool_timeout),
            ("VIRE_NODE_TIMEOUT", self.node_timeout),
            ("VIRE_WORKFLOW_TIMEOUT", self.workflow_timeout),
        ] {
            if value.is_zero() {
                anyhow::bail!("{name} must be greater than zero");
            }
        }

        Ok(())
    }

    /// Loop limits handed to the analyst subgraph
    pub fn loop_config(&self) -> AnalystLoopConfig {
        AnalystLoopConfig::default()
            .with_max_tool_calls(self.max_tool_calls)
            .with_tool_timeout(self.tool_timeout)
    }

    /// Runtime limits for the pipeline graph and each analyst loop
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::default()
            .with_node_timeout(self.node_timeout)
            .with_workflow_timeout(self.workflow_timeout)
    }

    /// Every tool any tier may use, sharing one search rate limiter
    pub fn registry(&self) -> ToolRegistry {
        let limiter = RateLimiter::new(self.search_delay);
        let knowledge = OpenAICompatibleProvider::new(&self.knowledge_base_url, &self.knowledge_model);

        ToolRegistry::new()
            .with(Arc::new(VqaTool::new(&self.vision_base_url)))
            .with(Arc::new(ObjectAnalysisTool::new(&self.vision_base_url)))
            .with(Arc::new(WikipediaTool::new(&self.wikipedia_base_url, limiter.clone())))
            .with(Arc::new(ArxivTool::new(&self.arxiv_base_url, limiter)))
            .with(Arc::new(LlmKnowledgeTool::new(Arc::new(knowledge))))
    }

    /// Assemble the pipeline for one tier, or for every tier in turn
    pub fn pipeline(&self, selection: TierSelection) -> Result<Pipeline> {
        let mut llm = OpenAICompatibleProvider::new(&self.llm_base_url, &self.llm_model)
            .with_temperature(self.temperature);
        if let Some(key) = &self.llm_api_key {
            llm = llm.with_api_key(key);
        }

        PipelineBuilder::new()
            .tiers(selection.tiers())
            .llm(Arc::new(llm))
            .captioner(Arc::new(HttpCaptioner::new(&self.vision_base_url)))
            .registry(self.registry())
            .loop_config(self.loop_config())
            .graph_config(self.graph_config())
            .build()
            .with_context(|| format!("Failed to assemble the {selection} pipeline"))
    }
}

fn parse_seconds(value: &str) -> Result<Duration> {
    let secs: f64 = value.trim().parse()?;
    Duration::try_from_secs_f64(secs).map_err(Into::into)
}
