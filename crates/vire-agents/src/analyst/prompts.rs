//! Prompt templates and rendering helpers
//!
//! Templates use `{placeholder}` slots. Placeholders without a value are
//! left as written.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::tools::Candidate;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder pattern"));

/// Shown for evidence that has not been gathered
pub const NONE: &str = "None";

/// Substitute `{key}` slots in `template`
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// `label(0.92), label(0.05)`, or `None`
pub fn format_candidates(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return NONE.to_string();
    }
    candidates
        .iter()
        .map(Candidate::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comma-separated list, or `None`
pub fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

// Junior

pub const JUNIOR_TURN: &str = "\
You are **Junior Planner**, a lightweight agent that decides which actions to take for basic image-based Q&A tasks.

**Available Actions**
- **Action_1:** Perform Visual Question Answering (VQA) on the image.

**Rules**
1. **Always** begin with **Action_1**.
2. Once candidates are available, reply with Finish.

**Input**
- **Question:** {question}
- **Tool Calls Made:** {tool_calls}
- **Candidates:** {candidates}

**Output**
Response format: [Action_1] or Finish";

pub const JUNIOR_RATIONALE: &str = "\
Your task is to write a short logical explanation for the answer to a question about an image. Do not include a final concluding sentence. Use the visual details from 'Context' and 'Candidates'.
Important: The 'Candidates' list is a suggestion and may be misleading or entirely incorrect.

### EXAMPLE
Context: A herd of zebras are gathered on a grassy field.
Question: What are the animals doing?
Candidates: grazing(0.88), standing(0.09), running(0.02)
Rationale: The zebras have their heads lowered and their mouths are close to the grass.
### END OF EXAMPLE

### Now solve the new task
Context: {context}
Question: {question}
Candidates: {candidates}
Rationale:";

pub const JUNIOR_FINAL: &str = "\
You are a multiple-choice visual-question-answering assistant.
For **each** task you receive:
- **Context:** <plain-text description of the image or scene>
- **Question:** <single question>
- **Candidates:** <comma-separated list written as name(probability)>
- **Rationale:** <reasoning about the image>

### Instructions
1. Read the *Context*, the *Question* and the *Rationale* carefully.
2. Decide which single **candidate** best answers the question. When the Rationale disagrees with the candidate ranking, follow the Rationale.
3. Respond on one line in the exact format: Answer: <candidate_name>

### FORMAT EXAMPLE
Context: A close-up of an elephant standing behind a cement wall.
Question: What item in the picture is purported to have a great memory?
Candidates: elephant(0.99), trunk(0.70), dumbo(0.09), brain(0.08), tusk(0.03)
Rationale: Elephants are widely said to never forget.
Answer: elephant
### END OF EXAMPLE

### Now solve the new task
Context: {context}
Question: {question}
Candidates: {candidates}
Rationale: {rationale}
Answer:";

// Senior

pub const SENIOR_TURN: &str = "\
You are an AI assistant executing a task. Analyze the current state of your progress and decide the next best action.

## Available Tools:
- **vqa_tool**: Visual Question Answering directly on the image to get candidate answers.
- **wikipedia**: Retrieve factual, encyclopedic knowledge relevant to the question.
- **arxiv**: Retrieve scientific background from research abstracts.

## Task
Gather the information needed to answer the user's question about the image.
User Question: {question}
Context: {context}

## Current Progress Summary
- Tool Calls Made: {tool_calls}
- Tools Used: {called_tools}
- Failures: {diagnostics}

## Information Gathered
### Answer Candidate:
{candidates}

### Factual Knowledge:
{kbs_knowledge}

## Your Decision
- If you have enough information to answer, reply with \"Finish\".
- Otherwise choose ONE tool from the available list, e.g. `Action: wikipedia`. Do not repeat a tool call if you already have its information.";

pub const SENIOR_RATIONALE: &str = "\
Your task is to generate a logical explanation. Do not include a final concluding sentence. Synthesize the visual details from 'Candidates' and 'Context' with the facts from 'KBs_Knowledge'.
Important: The 'Candidates' list is a suggestion and may be misleading or entirely incorrect.

### EXAMPLE 1
Context: A wooden dining table is shown with a glossy finish.
Question: What is the table made of?
Candidates: wood(0.92), metal(0.05), plastic(0.02)
KBs_Knowledge: Materials that are brown, smooth, and shiny are often polished or varnished wood.
Rationale: The surface of the table is brown, smooth and glossy, which is characteristic of wood.

### EXAMPLE 2
Context: Two police officers on horseback patrolling a city street.
Question: What is the man doing?
Candidates: walking(0.65), standing(0.20), talking(0.10)
KBs_Knowledge: The action of sitting on and controlling a horse is called riding.
Rationale: The image shows two men seated on the backs of horses.
### END OF EXAMPLES

### Now solve the new task
Context: {context}
Question: {question}
Candidates: {candidates}
KBs_Knowledge: {kbs_knowledge}
Rationale:";

// Manager

pub const MANAGER_TURN: &str = "\
You are an AI assistant executing a task. Analyze the current state of your progress and decide the next best action.

## Available Tools:
- **vqa_tool**: Visual Question Answering directly on the image to get initial candidate answers.
- **wikipedia**: Retrieve factual, encyclopedic knowledge from external sources relevant to the question.
- **llm_knowledge**: Generate background knowledge and common-sense context using the LLM.
- **analyze_image_object**: Describe the objects in the image that the question is about.

## Task
Your goal is to gather all the information needed to answer the user's question based on the provided image and context.
To build a complete answer, you should use the available tools to gather each type of information.
User Question: {question}
Context: {context}

## Current Progress Summary
- Tool Calls Made: {tool_calls}
- Tools Used: {called_tools}
- Failures: {diagnostics}

## Information Gathered
### Answer Candidate:
{candidates}

### LLM_Knowledge:
{llm_knowledge}

### Factual Knowledge:
{kbs_knowledge}

### Object_Analysis:
{object_analysis}

## Your Decision
Based on the information you have, carefully review the user's question again.
- If you have enough information to provide a complete and accurate answer, your next action is to return \"Finish\".
- If the current information is insufficient, choose ONE tool from the available list to gather the missing information and reply with `Action: <tool name>`. Do not repeat a tool call if you already have the necessary information.";

pub const MANAGER_RATIONALE: &str = "\
Your task is to generate a logical explanation. Do not include a final concluding sentence. Synthesize the visual details from 'Candidates', 'Context', 'Object_Analysis', with the facts from 'KBs_Knowledge' and 'LLM_Knowledge'.
Important: The 'Candidates' list is a suggestion and may be misleading or entirely incorrect.

### EXAMPLE 1
Context: A photo of a single banana that has been partially peeled.
Question: Is the banana closed?
Candidates: no(0.95), yes(0.05), rotten(0.00)
KBs_Knowledge: A banana is considered open when its peel is removed to expose the fruit inside.
LLM_Knowledge: Peeling a fruit involves removing its outer skin, revealing the interior.
Object_Analysis: One banana, peel pulled back halfway, pale fruit visible.
Rationale: The banana has been partially peeled, exposing the fruit inside.

### EXAMPLE 2
Context: Two police officers on horseback patrolling a city street.
Question: What is the man doing?
Candidates: walking(0.65), standing(0.20), talking(0.10), running(0.05)
KBs_Knowledge: The action of sitting on and controlling a horse is called riding.
LLM_Knowledge: Police officers on horseback are known as mounted police.
Object_Analysis: Two men in uniform sitting on brown horses in the street.
Rationale: The image shows two men seated on the backs of horses.
### END OF EXAMPLES

### Now solve the new task
Context: {context}
Question: {question}
Candidates: {candidates}
KBs_Knowledge: {kbs_knowledge}
LLM_Knowledge: {llm_knowledge}
Object_Analysis: {object_analysis}
Rationale:";

/// Final prompt shared by the Senior and Manager tiers
pub const EVIDENCE_FINAL: &str = "\
You are a visual-question-answering assistant that generates the most accurate answer based on evidence.
For each task you receive:
- **Context:** <plain-text description of the image or scene>
- **Question:** <single question>
- **Candidates:** <possible answers with probabilities, generated by a vision model>
- **Rationale:** <the core reasoning that justifies the final answer>

### Instructions
1. Read **Context**, **Question**, **Candidates**, and **Rationale** carefully.
2. The 'Candidates' are only suggestions and may be incorrect. Your final answer must be based on the evidence in the Rationale. If the Rationale points to an answer not in the Candidates list, ignore the list.
3. Answer concisely in a single word or short phrase, in the language of the Question.

### EXAMPLE 1
Context: A wooden dining table is shown with a glossy finish.
Question: What is the table made of?
Candidates: wood(0.92), metal(0.05), plastic(0.02)
Rationale: The surface of the table is brown, smooth and glossy, which is characteristic of wood.
Answer: wood

### EXAMPLE 2
Context: Two police officers on horseback patrolling a city street.
Question: What is the man doing?
Candidates: walking(0.65), standing(0.20), talking(0.10), running(0.05)
Rationale: The image shows two men seated on the backs of horses, an action called riding. The candidate list does not contain this answer.
Answer: riding a horse
### END OF EXAMPLES

### Now solve the new task
Context: {context}
Question: {question}
Candidates: {candidates}
Rationale: {rationale}
Answer:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_known_and_unknown() {
        let out = render(
            "Q: {question} C: {context} X: {missing} {question}",
            &[("question", "why?"), ("context", "a dog")],
        );
        assert_eq!(out, "Q: why? C: a dog X: {missing} why?");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{a}", &[("a", "{b}"), ("b", "nope")]);
        assert_eq!(out, "{b}");
    }

    #[test]
    fn test_render_ignores_non_identifiers() {
        let out = render("json {\"tool\": 1} and { spaced }", &[("tool", "x")]);
        assert_eq!(out, "json {\"tool\": 1} and { spaced }");
    }

    #[test]
    fn test_format_candidates() {
        assert_eq!(format_candidates(&[]), "None");
        let list = vec![Candidate::new("elephant", 0.99), Candidate::new("trunk", 0.7)];
        assert_eq!(format_candidates(&list), "elephant(0.99), trunk(0.70)");
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(&[]), "None");
        assert_eq!(
            format_list(&["vqa_tool".to_string(), "wikipedia".to_string()]),
            "vqa_tool, wikipedia"
        );
    }

    #[test]
    fn test_every_rationale_prompt_flags_candidates() {
        for template in [JUNIOR_RATIONALE, SENIOR_RATIONALE, MANAGER_RATIONALE] {
            assert!(template.contains("may be misleading"));
        }
        for template in [JUNIOR_FINAL, EVIDENCE_FINAL] {
            assert!(template.contains("{rationale}"));
            assert!(template.trim_end().ends_with("Answer:"));
        }
    }
}
