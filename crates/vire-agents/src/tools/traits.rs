//! Tool trait, evidence slots and the tool registry

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolError;
use crate::vision::ImageRef;

/// Tool schema as offered to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// One ranked answer proposed by the vision-QA tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub confidence: f64,
}

impl Candidate {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.2})", self.label, self.confidence)
    }
}

/// Named knowledge buffer a tool writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// Wikipedia summaries
    Encyclopedic,
    /// arXiv abstracts
    Academic,
    /// Text produced by the knowledge model
    Generated,
    /// Object-level description from the vision service
    ObjectAnalysis,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::Encyclopedic => "encyclopedic",
            KnowledgeSource::Academic => "academic",
            KnowledgeSource::Generated => "generated",
            KnowledgeSource::ObjectAnalysis => "object_analysis",
        }
    }
}

impl fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tool's output lands in the analyst state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSlot {
    /// Replaces the candidate list
    Candidates,
    /// Overwrites one knowledge buffer
    Knowledge(KnowledgeSource),
}

/// Everything a tool may read for one invocation
#[derive(Debug, Clone, Default)]
pub struct ToolInput {
    /// Arguments chosen by the model, `{}` when it named the tool only
    pub args: Value,
    pub question: String,
    /// Image caption
    pub context: String,
    pub image: ImageRef,
}

impl ToolInput {
    /// String argument by key, ignoring blanks
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The `query` argument, falling back to the question
    pub fn query(&self) -> &str {
        self.arg_str("query").unwrap_or_else(|| self.question.trim())
    }
}

/// Result of a successful tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Candidates(Vec<Candidate>),
    Text(String),
}

/// An external capability the analyst loop can dispatch
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and argument schema
    fn definition(&self) -> ToolDefinition;

    /// Evidence slot the output is merged into
    fn slot(&self) -> EvidenceSlot;

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError>;
}

/// Shared handle to a tool
pub type DynTool = Arc<dyn Tool>;

/// Name → tool lookup, read-only once handed to a graph
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, DynTool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its definition name
    pub fn register(&mut self, tool: DynTool) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, tool: DynTool) -> Self {
        self.register(tool);
        self
    }

    /// Register multiple tools at once
    pub fn register_all(&mut self, tools: Vec<DynTool>) {
        for tool in tools {
            self.register(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&DynTool> {
        self.tools.get(name)
    }

    /// Get all tool definitions, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Get all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// View containing only `names`
    ///
    /// Returns the first name that is not registered.
    pub fn restricted_to<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, String> {
        let mut tools = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let tool = self.tools.get(name).ok_or_else(|| name.to_string())?;
            tools.insert(name.to_string(), Arc::clone(tool));
        }
        Ok(Self { tools })
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.to_string(),
                description: "Echo the query".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        fn slot(&self) -> EvidenceSlot {
            EvidenceSlot::Knowledge(KnowledgeSource::Generated)
        }

        async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::Text(input.query().to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with(Arc::new(EchoTool("wikipedia")))
            .with(Arc::new(EchoTool("arxiv")))
            .with(Arc::new(EchoTool("vqa_tool")))
    }

    #[test]
    fn test_candidate_display() {
        assert_eq!(Candidate::new("zebra", 0.9234).to_string(), "zebra(0.92)");
        assert_eq!(Candidate::new("horse", 0.1).to_string(), "horse(0.10)");
    }

    #[test]
    fn test_knowledge_source_serde() {
        let value = serde_json::to_value(KnowledgeSource::ObjectAnalysis).unwrap();
        assert_eq!(value, json!("object_analysis"));
        assert_eq!(KnowledgeSource::Encyclopedic.to_string(), "encyclopedic");
    }

    #[test]
    fn test_tool_input_query_fallback() {
        let mut input = ToolInput {
            question: " What animal is this? ".to_string(),
            ..Default::default()
        };
        assert_eq!(input.query(), "What animal is this?");

        input.args = json!({"query": "  "});
        assert_eq!(input.query(), "What animal is this?");

        input.args = json!({"query": "zebra stripes"});
        assert_eq!(input.query(), "zebra stripes");
        assert_eq!(input.arg_str("missing"), None);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert!(registry.contains("arxiv"));
        assert!(registry.get("llm_knowledge").is_none());
        assert_eq!(registry.names(), vec!["arxiv", "vqa_tool", "wikipedia"]);
        assert_eq!(registry.definitions()[0].name, "arxiv");
    }

    #[test]
    fn test_registry_restricted_view() {
        let registry = registry();

        let view = registry.restricted_to(&["vqa_tool", "wikipedia"]).unwrap();
        assert_eq!(view.names(), vec!["vqa_tool", "wikipedia"]);
        assert!(!view.contains("arxiv"));

        let missing = registry
            .restricted_to(&["vqa_tool", "analyze_image_object"])
            .unwrap_err();
        assert_eq!(missing, "analyze_image_object");
    }

    #[test]
    fn test_registry_debug_lists_names() {
        let debug = format!("{:?}", registry());
        assert!(debug.contains("wikipedia"));
    }

    #[tokio::test]
    async fn test_registered_tool_executes() {
        let registry = registry();
        let tool = registry.get("wikipedia").unwrap();
        let input = ToolInput {
            args: json!({"query": "Grevy's zebra"}),
            ..Default::default()
        };
        let output = tool.execute(&input).await.unwrap();
        assert_eq!(output, ToolOutput::Text("Grevy's zebra".to_string()));
    }
}
