//! Model response → typed action
//!
//! The parser is the boundary between free-form model output and the loop.
//! Anything it cannot read becomes [`AgentAction::Done`], so a confused model
//! moves the loop toward synthesis instead of stalling it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::llm::LLMResponse;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think pattern"));
static ACTION_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*action_(\d+)\s*\]").expect("valid action index pattern"));
static ACTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#>-]*action[\s*]*:[\s*`]*([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid action line pattern")
});
static FINISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(finish|finished|done)\b").expect("valid finish pattern"));

/// A tool invocation chosen by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

impl ToolRequest {
    /// Request with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: empty_args(),
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

/// What the model decided for this turn
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    ToolRequest(ToolRequest),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("empty response")]
    Empty,

    #[error("[Action_{0}] does not name a permitted tool")]
    ActionIndex(usize),

    #[error("response mentions several tools: {0:?}")]
    Ambiguous(Vec<String>),

    #[error("no recognizable action")]
    Unrecognized,
}

/// Remove `<think>` blocks, including an unterminated leading one
pub fn strip_think(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    let tail = match stripped.rfind("</think>") {
        Some(pos) => &stripped[pos + "</think>".len()..],
        None => match stripped.find("<think>") {
            Some(pos) => &stripped[..pos],
            None => &stripped,
        },
    };
    tail.trim().to_string()
}

/// Parse a response, treating every failure as `Done`
pub fn decide(response: &LLMResponse, permitted: &[String]) -> AgentAction {
    match parse_action(response, permitted) {
        Ok(action) => action,
        Err(failure) => {
            debug!(%failure, "Unparseable turn decision, finishing");
            AgentAction::Done
        }
    }
}

/// Parse a response into an action
///
/// Names are returned as written; checking them against the permitted set
/// is left to the caller.
pub fn parse_action(
    response: &LLMResponse,
    permitted: &[String],
) -> Result<AgentAction, ParseFailure> {
    if let Some(call) = response
        .message
        .tool_calls
        .as_ref()
        .and_then(|calls| calls.first())
    {
        return Ok(AgentAction::ToolRequest(
            ToolRequest::new(call.name.clone()).with_args(normalize_args(call.arguments.clone())),
        ));
    }

    let text = strip_think(response.content());
    if text.is_empty() {
        return Err(ParseFailure::Empty);
    }

    if let Some(request) = parse_json_request(&text) {
        return Ok(AgentAction::ToolRequest(request));
    }

    if let Some(caps) = ACTION_INDEX.captures(&text) {
        let index: usize = caps[1].parse().map_err(|_| ParseFailure::Unrecognized)?;
        return index
            .checked_sub(1)
            .and_then(|i| permitted.get(i))
            .map(|name| AgentAction::ToolRequest(ToolRequest::new(name.clone())))
            .ok_or(ParseFailure::ActionIndex(index));
    }

    if let Some(caps) = ACTION_LINE.captures(&text) {
        let name = &caps[1];
        if FINISH.is_match(name) {
            return Ok(AgentAction::Done);
        }
        return Ok(AgentAction::ToolRequest(ToolRequest::new(name)));
    }

    if FINISH.is_match(&text) {
        return Ok(AgentAction::Done);
    }

    let mentioned: Vec<String> = permitted
        .iter()
        .filter(|name| mentions(&text, name))
        .cloned()
        .collect();
    match mentioned.len() {
        0 => Err(ParseFailure::Unrecognized),
        1 => Ok(AgentAction::ToolRequest(ToolRequest::new(mentioned[0].clone()))),
        _ => Err(ParseFailure::Ambiguous(mentioned)),
    }
}

/// `{"tool"|"name": ..., "args"|"arguments": {...}}` anywhere in the text
fn parse_json_request(text: &str) -> Option<ToolRequest> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    let name = value
        .get("tool")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)?
        .trim();
    if name.is_empty() {
        return None;
    }
    let args = value
        .get("args")
        .or_else(|| value.get("arguments"))
        .cloned()
        .map(normalize_args)
        .unwrap_or_else(empty_args);
    Some(ToolRequest::new(name).with_args(args))
}

/// Arguments as an object; JSON strings are decoded, anything else dropped
fn normalize_args(args: Value) -> Value {
    match args {
        Value::Object(_) => args,
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => empty_args(),
        },
        _ => empty_args(),
    }
}

/// Whole-word match of a tool name
fn mentions(text: &str, name: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(name).any(|(pos, _)| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + name.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, ToolCall};
    use serde_json::json;

    fn permitted() -> Vec<String> {
        ["vqa_tool", "wikipedia", "llm_knowledge"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn parse(text: &str) -> Result<AgentAction, ParseFailure> {
        parse_action(&LLMResponse::text(text), &permitted())
    }

    fn request(name: &str) -> AgentAction {
        AgentAction::ToolRequest(ToolRequest::new(name))
    }

    #[test]
    fn test_strip_think() {
        assert_eq!(strip_think("<think>hmm\nmaybe</think>\nFinish"), "Finish");
        assert_eq!(strip_think("reasoning only</think> [Action_1]"), "[Action_1]");
        assert_eq!(strip_think("Answer: cat <think>never closed"), "Answer: cat");
        assert_eq!(strip_think("  plain  "), "plain");
    }

    #[test]
    fn test_native_tool_call_wins() {
        let response = LLMResponse::new(Message::assistant_with_tool_calls(
            "Finish",
            vec![
                ToolCall {
                    id: "call_1".to_string(),
                    name: "wikipedia".to_string(),
                    arguments: json!("{\"query\": \"zebra\"}"),
                },
                ToolCall {
                    id: "call_2".to_string(),
                    name: "vqa_tool".to_string(),
                    arguments: json!({}),
                },
            ],
        ));
        let action = parse_action(&response, &permitted()).unwrap();
        assert_eq!(
            action,
            AgentAction::ToolRequest(
                ToolRequest::new("wikipedia").with_args(json!({"query": "zebra"}))
            )
        );
    }

    #[test]
    fn test_json_request() {
        let action = parse(r#"I'll search. {"tool": "wikipedia", "args": {"query": "zebra"}}"#).unwrap();
        assert_eq!(
            action,
            AgentAction::ToolRequest(ToolRequest::new("wikipedia").with_args(json!({"query": "zebra"})))
        );

        let action = parse(r#"{"name": "vqa_tool", "arguments": "not json"}"#).unwrap();
        assert_eq!(action, request("vqa_tool"));
    }

    #[test]
    fn test_action_index() {
        assert_eq!(parse("[Action_1]").unwrap(), request("vqa_tool"));
        assert_eq!(parse("Response: [ action_2 ]").unwrap(), request("wikipedia"));
        assert_eq!(parse("[Action_9]"), Err(ParseFailure::ActionIndex(9)));
        assert_eq!(parse("[Action_0]"), Err(ParseFailure::ActionIndex(0)));
    }

    #[test]
    fn test_action_line() {
        assert_eq!(parse("Thought: need facts\nAction: wikipedia").unwrap(), request("wikipedia"));
        assert_eq!(parse("**Action:** `llm_knowledge`").unwrap(), request("llm_knowledge"));
        assert_eq!(parse("Action: Finish").unwrap(), AgentAction::Done);
    }

    #[test]
    fn test_unpermitted_names_pass_through() {
        assert_eq!(parse("Action: arxiv").unwrap(), request("arxiv"));
        assert_eq!(parse(r#"{"tool": "web_search"}"#).unwrap(), request("web_search"));
    }

    #[test]
    fn test_finish_keyword() {
        assert_eq!(parse("Finish").unwrap(), AgentAction::Done);
        assert_eq!(parse("I am done gathering evidence.").unwrap(), AgentAction::Done);
        assert_eq!(parse("<think>use wikipedia?</think>FINISH").unwrap(), AgentAction::Done);
    }

    #[test]
    fn test_single_mention() {
        assert_eq!(parse("Let me call llm_knowledge next.").unwrap(), request("llm_knowledge"));
        assert_eq!(
            parse("Either wikipedia or vqa_tool"),
            Err(ParseFailure::Ambiguous(vec![
                "vqa_tool".to_string(),
                "wikipedia".to_string()
            ]))
        );
        // substring of a longer identifier is not a mention
        assert_eq!(parse("my_vqa_tool_v2 looks good"), Err(ParseFailure::Unrecognized));
    }

    #[test]
    fn test_failures_become_done() {
        assert_eq!(parse(""), Err(ParseFailure::Empty));
        assert_eq!(parse("<think>only thoughts</think>"), Err(ParseFailure::Empty));
        assert_eq!(parse("The sky is blue."), Err(ParseFailure::Unrecognized));

        for text in ["", "The sky is blue.", "[Action_7]", "wikipedia vqa_tool"] {
            assert_eq!(decide(&LLMResponse::text(text), &permitted()), AgentAction::Done);
        }
    }
}
