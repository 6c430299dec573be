//! Assembly of the analyst loop graph

use std::sync::Arc;

use tracing::debug;

use super::descriptor::Analyst;
use super::nodes::{
    DispatchNode, FinalReasoningNode, RationaleNode, TurnNode, AGENT_NODE, FINAL_NODE,
    RATIONALE_NODE, TOOLS_NODE,
};
use super::routing::{should_continue, Route};
use super::state::{AnalystLoopConfig, AnalystLoopState};
use crate::error::AgentError;
use crate::graph::{CompiledGraph, GraphConfig, StateGraph, END};
use crate::llm::LLMProvider;
use crate::tools::ToolRegistry;

/// Node executions needed for `ceiling` rounds plus synthesis
fn steps_for(ceiling: usize) -> usize {
    2 * ceiling + 3
}

/// Build the turn → tools → turn loop for one analyst
///
/// ```text
/// agent --continue--> tools --> agent
/// agent --rationale--> rationale --> final_reasoning --> END
/// ```
///
/// Fails with [`AgentError::MissingTool`] if a permitted tool is not in
/// `registry`.
pub fn build_analyst_graph(
    analyst: Analyst,
    registry: &ToolRegistry,
    llm: Arc<dyn LLMProvider>,
    loop_config: AnalystLoopConfig,
    graph_config: GraphConfig,
) -> Result<CompiledGraph<AnalystLoopState>, AgentError> {
    let permitted = registry
        .restricted_to(analyst.tools())
        .map_err(|tool| AgentError::MissingTool {
            analyst: analyst.name().to_string(),
            tool,
        })?;
    let definitions = analyst
        .tools()
        .iter()
        .filter_map(|name| permitted.get(name))
        .map(|tool| tool.definition())
        .collect();

    let ceiling = loop_config.max_tool_calls;
    let mut graph_config = graph_config;
    if graph_config.max_steps < steps_for(ceiling) {
        debug!(
            analyst = %analyst.name(),
            max_steps = steps_for(ceiling),
            "Raising step ceiling to fit the tool-call ceiling"
        );
        graph_config.max_steps = steps_for(ceiling);
    }

    let name = format!("{}_loop", analyst.name().to_lowercase());
    let analyst = Arc::new(analyst);

    let graph = StateGraph::new(name)
        .node(TurnNode::new(Arc::clone(&analyst), Arc::clone(&llm), definitions))
        .node(DispatchNode::new(Arc::clone(&analyst), permitted, loop_config))
        .node(RationaleNode::new(Arc::clone(&analyst), Arc::clone(&llm)))
        .node(FinalReasoningNode::new(analyst, llm))
        .entry(AGENT_NODE)
        .conditional_edges(
            AGENT_NODE,
            move |state: &AnalystLoopState| should_continue(state, ceiling).label(),
            vec![(Route::CONTINUE, TOOLS_NODE), (Route::SYNTHESIZE, RATIONALE_NODE)],
        )
        .edge(TOOLS_NODE, AGENT_NODE)
        .edge(RATIONALE_NODE, FINAL_NODE)
        .edge(FINAL_NODE, END)
        .config(graph_config)
        .build()?;

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::vision::ImageRef;

    fn llm(texts: &[&str]) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::from_texts(texts.iter().copied()))
    }

    #[test]
    fn test_missing_tool_rejected_at_build() {
        let err = build_analyst_graph(
            Analyst::junior(),
            &ToolRegistry::new(),
            llm(&[]),
            AnalystLoopConfig::default(),
            GraphConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AgentError::MissingTool { ref analyst, ref tool } if analyst == "Junior" && tool == "vqa_tool"
        ));
    }

    #[test]
    fn test_steps_fit_ceiling() {
        assert_eq!(steps_for(0), 3);
        assert_eq!(steps_for(5), 13);
    }

    #[tokio::test]
    async fn test_analyst_without_tools() {
        let analyst = Analyst::new(
            "Solo",
            "Answers from the caption alone",
            Vec::<String>::new(),
            crate::analyst::AnalystPrompts::new("Turn {question}", "Why {question}", "Pick {rationale}"),
        );
        let provider = llm(&["Finish", "Because stripes.", "Answer: zebra"]);
        let graph = build_analyst_graph(
            analyst,
            &ToolRegistry::new(),
            provider.clone(),
            AnalystLoopConfig::default(),
            GraphConfig::default(),
        )
        .unwrap();

        assert_eq!(
            graph.to_mermaid().lines().next(),
            Some("graph TD")
        );

        let result = graph
            .run(AnalystLoopState::new("Solo", "What animal?", "a zebra", ImageRef::default()))
            .await
            .unwrap();

        assert_eq!(result.state.final_answer.as_deref(), Some("zebra"));
        assert_eq!(result.state.rationale.as_deref(), Some("Because stripes."));
        assert_eq!(
            result.steps.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["agent", "rationale", "final_reasoning"]
        );
        assert_eq!(provider.calls()[2].prompt(), "Pick Because stripes.");
    }
}
