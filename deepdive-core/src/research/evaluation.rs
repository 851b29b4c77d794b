//! Evidence evaluation and follow-up query refinement.

use super::planner::ResearchPlanItem;
use super::prompts;
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// The reviewer's verdict on the evidence gathered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_complete: bool,
    pub unanswered_questions: Vec<String>,
    pub reasoning: String,
}

/// A follow-up search query, phrased in English and Japanese.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedQuery {
    pub english_query: String,
    pub japanese_query: String,
}

impl RefinedQuery {
    pub fn new(english: impl Into<String>, japanese: impl Into<String>) -> Self {
        Self {
            english_query: english.into(),
            japanese_query: japanese.into(),
        }
    }
}

#[derive(Deserialize)]
struct RefineResponse {
    queries: Vec<RefinedQuery>,
}

/// Judges evidence completeness and proposes new queries for the gaps.
pub struct Evaluator {
    brain: Arc<Brain>,
    model: Option<String>,
    min_queries: usize,
    max_queries: usize,
}

impl Evaluator {
    pub fn new(brain: Arc<Brain>, config: &ResearchConfig) -> Self {
        Self {
            brain,
            model: config.model.clone(),
            min_queries: config.min_refined_queries,
            max_queries: config.max_refined_queries.max(config.min_refined_queries),
        }
    }

    /// Decide whether `evidence` answers every question in `plan`.
    pub async fn evaluate(
        &self,
        plan: &[ResearchPlanItem],
        evidence: &str,
    ) -> Result<Evaluation, LlmError> {
        let evaluation: Evaluation = self
            .brain
            .generate_structured(
                prompts::EVALUATOR_SYSTEM,
                &prompts::evaluation_prompt(plan, evidence),
                prompts::evaluation_schema(),
                "evaluation",
                self.model.clone(),
            )
            .await?;
        info!(
            complete = evaluation.is_complete,
            unanswered = evaluation.unanswered_questions.len(),
            "Evidence evaluated"
        );
        Ok(evaluation)
    }

    /// Turn `unanswered` questions into new bilingual search queries.
    ///
    /// Returns an empty list without calling out when there is nothing to
    /// refine. An empty result means no further evidence can be obtained.
    pub async fn refine(&self, unanswered: &[String]) -> Result<Vec<RefinedQuery>, LlmError> {
        if unanswered.is_empty() {
            warn!("Evaluation incomplete but listed no unanswered questions");
            return Ok(Vec::new());
        }
        let response: RefineResponse = self
            .brain
            .generate_structured(
                prompts::REFINER_SYSTEM,
                &prompts::refine_prompt(unanswered, self.min_queries, self.max_queries),
                prompts::refine_schema(self.min_queries, self.max_queries),
                "refined queries",
                self.model.clone(),
            )
            .await?;

        let mut queries: Vec<RefinedQuery> = response
            .queries
            .into_iter()
            .filter(|q| !(q.english_query.trim().is_empty() && q.japanese_query.trim().is_empty()))
            .collect();
        queries.truncate(self.max_queries);
        info!(queries = queries.len(), "Queries refined");
        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::LlmConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn evaluator(provider: Arc<MockLlmProvider>) -> Evaluator {
        let brain = Arc::new(Brain::new(provider, &LlmConfig::default()));
        Evaluator::new(brain, &ResearchConfig::default())
    }

    #[tokio::test]
    async fn test_evaluate_parses_verdict() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::json_response(json!({
            "is_complete": false,
            "unanswered_questions": ["cost?"],
            "reasoning": "No pricing data."
        })));
        let plan = vec![ResearchPlanItem::new("cost?", "費用は？")];
        let evaluation = evaluator(provider.clone())
            .evaluate(&plan, "### Query: x\ny")
            .await
            .unwrap();
        assert_eq!(
            evaluation,
            Evaluation {
                is_complete: false,
                unanswered_questions: vec!["cost?".into()],
                reasoning: "No pricing data.".into(),
            }
        );
        assert!(provider.requests()[0].messages[1].text.contains("### Query: x"));
    }

    #[tokio::test]
    async fn test_evaluate_wrong_type_is_malformed() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::json_response(json!({
            "is_complete": "yes",
            "unanswered_questions": [],
            "reasoning": ""
        })));
        let err = evaluator(provider).evaluate(&[], "").await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_refine_parses_and_truncates() {
        let provider = Arc::new(MockLlmProvider::new());
        let queries: Vec<_> = (1..=5)
            .map(|n| json!({"english_query": format!("q{n}"), "japanese_query": format!("質問{n}")}))
            .collect();
        provider.queue_response(MockLlmProvider::json_response(json!({ "queries": queries })));
        let refined = evaluator(provider)
            .refine(&["cost?".into()])
            .await
            .unwrap();
        assert_eq!(refined.len(), 3);
        assert_eq!(refined[0], RefinedQuery::new("q1", "質問1"));
    }

    #[tokio::test]
    async fn test_refine_empty_list_is_ok() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_response(MockLlmProvider::json_response(json!({"queries": []})));
        let refined = evaluator(provider).refine(&["cost?".into()]).await.unwrap();
        assert!(refined.is_empty());
    }

    #[tokio::test]
    async fn test_refine_without_unanswered_skips_call() {
        let provider = Arc::new(MockLlmProvider::new());
        let refined = evaluator(provider.clone()).refine(&[]).await.unwrap();
        assert!(refined.is_empty());
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_refine_failure_propagates() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(LlmError::Connection {
            message: "reset by peer".into(),
        });
        let err = evaluator(provider).refine(&["q".into()]).await.unwrap_err();
        assert!(matches!(err, LlmError::Connection { .. }));
    }
}
