//! Top-level pipeline: caption → analyst loop(s) → final processing
//!
//! ```ignore
//! let pipeline = PipelineBuilder::new()
//!     .tier(AnalystTier::Manager)
//!     .llm(llm)
//!     .captioner(captioner)
//!     .registry(registry)
//!     .build()?;
//!
//! let output = pipeline.invoke("What is the man riding?", ImageRef::from("img/1.jpg")).await?;
//! ```

pub mod state;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyst::{build_analyst_graph, Analyst, AnalystLoopConfig, AnalystLoopState, AnalystTier};
use crate::error::AgentError;
use crate::graph::{
    CompiledGraph, FnNode, GraphConfig, GraphError, Node, NodeId, StateGraph, SubgraphNode, END,
};
use crate::llm::{LLMProvider, TokenUsage};
use crate::tools::ToolRegistry;
use crate::vision::{Captioner, ImageRef};

pub use state::{AnalystEntry, WorkflowState, WorkflowUpdate};

pub const CAPTION_NODE: &str = "caption";
pub const FINAL_PROCESSING_NODE: &str = "final_processing";

/// Produces the image caption that every analyst reads as context
struct CaptionNode {
    id: NodeId,
    captioner: Arc<dyn Captioner>,
}

#[async_trait]
impl Node<WorkflowState> for CaptionNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn run(&self, state: &WorkflowState) -> Result<WorkflowUpdate, GraphError> {
        let caption = self
            .captioner
            .caption(&state.image)
            .await
            .map_err(|e| GraphError::node_error_with_source(&self.id, "captioning failed", e))?;
        info!(node = %self.id, captioner = self.captioner.name(), caption = %caption, "Image captioned");
        Ok(WorkflowUpdate::caption(caption))
    }
}

/// What a caller gets back from one invocation
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub run_id: String,
    pub image_caption: String,
    pub results: Vec<AnalystEntry>,
    pub rationales: Vec<AnalystEntry>,
    pub final_answer: String,
    pub explanation: String,
    /// Tokens reported by the analysts' model calls
    pub usage: TokenUsage,
    /// Top-level nodes in execution order
    pub steps: Vec<String>,
}

#[derive(Default)]
pub struct PipelineBuilder {
    analysts: Vec<Analyst>,
    llm: Option<Arc<dyn LLMProvider>>,
    captioner: Option<Arc<dyn Captioner>>,
    registry: ToolRegistry,
    loop_config: AnalystLoopConfig,
    graph_config: GraphConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a built-in tier; analysts run in the order they are added
    pub fn tier(self, tier: AnalystTier) -> Self {
        self.analyst(tier.analyst())
    }

    /// Add several tiers, e.g. `AnalystTier::ALL` for the full chain
    pub fn tiers(self, tiers: impl IntoIterator<Item = AnalystTier>) -> Self {
        self.analysts(tiers.into_iter().map(|tier| tier.analyst()))
    }

    pub fn analyst(mut self, analyst: Analyst) -> Self {
        self.analysts.push(analyst);
        self
    }

    pub fn analysts(mut self, analysts: impl IntoIterator<Item = Analyst>) -> Self {
        self.analysts.extend(analysts);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LLMProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn loop_config(mut self, config: AnalystLoopConfig) -> Self {
        self.loop_config = config;
        self
    }

    /// Runtime limits applied to both the pipeline and the analyst loops
    pub fn graph_config(mut self, config: GraphConfig) -> Self {
        self.graph_config = config;
        self
    }

    pub fn build(self) -> Result<Pipeline, AgentError> {
        if self.analysts.is_empty() {
            return Err(AgentError::Config("no analyst tier selected".to_string()));
        }
        let llm = self
            .llm
            .ok_or_else(|| AgentError::Config("no language model configured".to_string()))?;
        let captioner = self
            .captioner
            .ok_or_else(|| AgentError::Config("no captioner configured".to_string()))?;

        let mut analyst_names: Vec<String> = Vec::with_capacity(self.analysts.len());
        let mut analyst_graphs = Vec::with_capacity(self.analysts.len());
        let mut graph = StateGraph::new("vqa_pipeline")
            .node(CaptionNode {
                id: NodeId::from(CAPTION_NODE),
                captioner,
            })
            .entry(CAPTION_NODE);
        let mut previous = CAPTION_NODE.to_string();

        for analyst in self.analysts {
            let name = analyst.name().to_string();
            if analyst_names.contains(&name) {
                return Err(AgentError::Config(format!("analyst {name} added more than once")));
            }
            let node_name = analyst.node_name();
            let analyst_graph = Arc::new(build_analyst_graph(
                analyst,
                &self.registry,
                Arc::clone(&llm),
                self.loop_config.clone(),
                self.graph_config.clone(),
            )?);

            graph = graph
                .node(analyst_node(&node_name, &name, Arc::clone(&analyst_graph)))
                .edge(previous.as_str(), node_name.as_str());
            previous = node_name;
            analyst_names.push(name);
            analyst_graphs.push(analyst_graph);
        }

        let chain = analyst_names.clone();
        let final_processing = FnNode::new(FINAL_PROCESSING_NODE, move |state: WorkflowState| {
            let chain = chain.clone();
            async move {
                let (answer, explanation) = select_final(&chain, &state);
                Ok::<_, GraphError>(WorkflowUpdate::answer(answer, explanation))
            }
        });

        let graph = graph
            .node(final_processing)
            .edge(previous.as_str(), FINAL_PROCESSING_NODE)
            .edge(FINAL_PROCESSING_NODE, END)
            .config(self.graph_config)
            .build()?;

        Ok(Pipeline {
            graph,
            analyst_graphs,
            analyst_names,
        })
    }
}

/// Embed one analyst loop; it reads the caption and appends its entries
fn analyst_node(
    node_name: &str,
    analyst_name: &str,
    analyst_graph: Arc<CompiledGraph<AnalystLoopState>>,
) -> SubgraphNode<WorkflowState, AnalystLoopState> {
    let input_name = analyst_name.to_string();
    SubgraphNode::new(
        node_name,
        analyst_graph,
        move |state: &WorkflowState| {
            AnalystLoopState::new(
                input_name.clone(),
                state.question.clone(),
                state.image_caption.clone().unwrap_or_default(),
                state.image.clone(),
            )
        },
        |done: AnalystLoopState| {
            debug!(
                analyst = %done.analyst,
                tool_calls = done.tool_calls,
                total_tokens = done.usage.total_tokens,
                "Analyst loop finished"
            );
            let usage = done.usage;
            WorkflowUpdate::analyst_output(
                &done.analyst,
                done.final_answer.unwrap_or_default(),
                done.rationale.unwrap_or_default(),
            )
            .with_usage(usage)
        },
    )
}

fn entry_for(entries: &[AnalystEntry], analyst: &str) -> Option<String> {
    entries.iter().rev().find_map(|entry| entry.get(analyst)).cloned()
}

/// Pick the pipeline answer from the analysts' entries
///
/// The last analyst in the chain decides. When its answer is empty the
/// nearest earlier analyst with a non-empty answer is used instead, and the
/// explanation always comes from the analyst whose answer was chosen.
pub(crate) fn select_final(chain: &[String], state: &WorkflowState) -> (String, String) {
    for name in chain.iter().rev() {
        match entry_for(&state.results, name) {
            Some(answer) if !answer.trim().is_empty() => {
                let explanation = entry_for(&state.rationales, name).unwrap_or_default();
                debug!(analyst = %name, answer = %answer, "Final answer selected");
                return (answer, explanation);
            }
            _ => warn!(analyst = %name, "Analyst produced no answer"),
        }
    }
    (String::new(), String::new())
}

/// A compiled pipeline, reusable across samples
pub struct Pipeline {
    graph: CompiledGraph<WorkflowState>,
    analyst_graphs: Vec<Arc<CompiledGraph<AnalystLoopState>>>,
    analyst_names: Vec<String>,
}

impl Pipeline {
    /// Analyst names in execution order
    pub fn analyst_names(&self) -> &[String] {
        &self.analyst_names
    }

    pub fn graph(&self) -> &CompiledGraph<WorkflowState> {
        &self.graph
    }

    pub fn analyst_graphs(&self) -> &[Arc<CompiledGraph<AnalystLoopState>>] {
        &self.analyst_graphs
    }

    /// Mermaid diagrams of the pipeline and of each embedded analyst loop
    pub fn to_mermaid(&self) -> String {
        std::iter::once(self.graph.to_mermaid())
            .chain(self.analyst_graphs.iter().map(|g| g.to_mermaid()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Answer one question about one image
    #[tracing::instrument(
        skip_all,
        fields(analysts = ?self.analyst_names, run_id = tracing::field::Empty)
    )]
    pub async fn invoke(
        &self,
        question: impl Into<String>,
        image: ImageRef,
    ) -> Result<PipelineOutput, AgentError> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        info!(image = %image, "Pipeline started");

        let result = self.graph.run(WorkflowState::new(question, image)).await?;
        let state = result.state;

        info!(
            answer = %state.final_answer,
            steps = result.steps.len(),
            total_tokens = state.usage.total_tokens,
            "Pipeline finished"
        );
        Ok(PipelineOutput {
            run_id,
            image_caption: state.image_caption.unwrap_or_default(),
            results: state.results,
            rationales: state.rationales,
            final_answer: state.final_answer,
            explanation: state.explanation,
            usage: state.usage,
            steps: result.steps.into_iter().map(|s| s.0).collect(),
        })
    }
}
