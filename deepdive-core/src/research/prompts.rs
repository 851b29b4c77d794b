//! System instructions, prompt builders, and response schemas for each
//! research stage.

use super::planner::ResearchPlanItem;
use serde_json::{Value, json};

pub const PLANNER_SYSTEM: &str = "You are a meticulous research planner. \
Break the user's topic into focused research questions that together cover it. \
Write every question twice: once in natural English and once in natural Japanese, \
so that searches can reach sources in both languages.";

pub const SEARCH_SYSTEM: &str = "You are a research assistant with web search. \
Search for current, factual information answering the query. \
Report concrete findings (names, figures, dates) rather than generalities.";

pub const EVALUATOR_SYSTEM: &str = "You are a strict research reviewer. \
Decide whether the collected evidence answers every research question. \
Only mark the research complete when each question has a specific, supported answer.";

pub const REFINER_SYSTEM: &str = "You are a search strategist. \
Turn unanswered research questions into precise web search queries, \
each written in English and in Japanese.";

pub const SYNTHESIZER_SYSTEM: &str = "You are an expert analyst writing a research report. \
Use only the supplied evidence. Organize the report into clear sections \
and state plainly where the evidence is thin.";

pub fn plan_prompt(topic: &str, min_items: usize, max_items: usize) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Produce between {min_items} and {max_items} research questions. \
         Each item needs `english_question` and `japanese_question`."
    )
}

pub fn plan_schema(min_items: usize, max_items: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "plan": {
                "type": "array",
                "minItems": min_items,
                "maxItems": max_items,
                "items": {
                    "type": "object",
                    "properties": {
                        "english_question": {"type": "string"},
                        "japanese_question": {"type": "string"}
                    },
                    "required": ["english_question", "japanese_question"],
                    "propertyOrdering": ["english_question", "japanese_question"]
                }
            }
        },
        "required": ["plan"]
    })
}

pub fn evaluation_prompt(plan: &[ResearchPlanItem], evidence: &str) -> String {
    let questions: String = plan
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}\n", i + 1, item.english_question))
        .collect();
    let evidence = if evidence.is_empty() {
        "(no evidence collected)"
    } else {
        evidence
    };
    format!(
        "Research questions:\n{questions}\n\
         Collected evidence:\n{evidence}\n\n\
         Is every question answered? List the questions that remain unanswered \
         and explain your reasoning."
    )
}

pub fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_complete": {"type": "boolean"},
            "unanswered_questions": {"type": "array", "items": {"type": "string"}},
            "reasoning": {"type": "string"}
        },
        "required": ["is_complete", "unanswered_questions", "reasoning"],
        "propertyOrdering": ["is_complete", "unanswered_questions", "reasoning"]
    })
}

pub fn refine_prompt(unanswered: &[String], min_items: usize, max_items: usize) -> String {
    let questions: String = unanswered.iter().map(|q| format!("- {q}\n")).collect();
    format!(
        "These research questions are still unanswered:\n{questions}\n\
         Write between {min_items} and {max_items} new search queries that would \
         find the missing information. Each item needs `english_query` and `japanese_query`."
    )
}

pub fn refine_schema(min_items: usize, max_items: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "queries": {
                "type": "array",
                "minItems": min_items,
                "maxItems": max_items,
                "items": {
                    "type": "object",
                    "properties": {
                        "english_query": {"type": "string"},
                        "japanese_query": {"type": "string"}
                    },
                    "required": ["english_query", "japanese_query"],
                    "propertyOrdering": ["english_query", "japanese_query"]
                }
            }
        },
        "required": ["queries"]
    })
}

pub fn synthesis_prompt(topic: &str, evidence: &str, language: &str) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Evidence:\n{evidence}\n\n\
         Write the final report in {language}: a title, a short summary, \
         and sections each with a heading and content."
    )
}

pub fn synthesis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "summary": {"type": "string"},
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "heading": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["heading", "content"]
                }
            }
        },
        "required": ["title", "summary", "sections"],
        "propertyOrdering": ["title", "summary", "sections"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_schema_bounds() {
        let schema = plan_schema(3, 5);
        assert_eq!(schema["properties"]["plan"]["minItems"], 3);
        assert_eq!(schema["properties"]["plan"]["maxItems"], 5);
    }

    #[test]
    fn test_evaluation_prompt_lists_questions() {
        let plan = vec![ResearchPlanItem::new("What is QKD?", "QKDとは何か？")];
        let prompt = evaluation_prompt(&plan, "");
        assert!(prompt.contains("1. What is QKD?"));
        assert!(prompt.contains("(no evidence collected)"));
    }

    #[test]
    fn test_refine_prompt_lists_unanswered() {
        let prompt = refine_prompt(&["cost?".into(), "timeline?".into()], 2, 3);
        assert!(prompt.contains("- cost?\n- timeline?"));
        assert!(prompt.contains("between 2 and 3"));
    }
}
