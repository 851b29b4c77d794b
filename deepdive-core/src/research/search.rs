//! Grounded web search, one remote call per query.

use super::evaluation::RefinedQuery;
use super::planner::ResearchPlanItem;
use super::prompts;
use crate::brain::Brain;
use crate::error::LlmError;
use crate::types::Source;
use std::sync::Arc;
use tracing::debug;

/// Text and citations returned for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Runs grounded searches against the model.
pub struct Searcher {
    brain: Arc<Brain>,
    model: Option<String>,
}

impl Searcher {
    pub fn new(brain: Arc<Brain>, model: Option<String>) -> Self {
        Self { brain, model }
    }

    /// Search the web for `query`.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, LlmError> {
        let (text, sources) = self
            .brain
            .grounded_search(prompts::SEARCH_SYSTEM, query, self.model.clone())
            .await?;
        debug!(query, sources = sources.len(), "Search returned");
        Ok(SearchOutcome { text, sources })
    }
}

/// Queries for the first round: English then Japanese for each plan item.
pub fn queries_from_plan(plan: &[ResearchPlanItem]) -> Vec<String> {
    bilingual(
        plan.iter()
            .map(|item| (&item.english_question, &item.japanese_question)),
    )
}

/// Queries for a later round, in the same order as [`queries_from_plan`].
pub fn queries_from_refined(refined: &[RefinedQuery]) -> Vec<String> {
    bilingual(
        refined
            .iter()
            .map(|query| (&query.english_query, &query.japanese_query)),
    )
}

fn bilingual<'a>(pairs: impl Iterator<Item = (&'a String, &'a String)>) -> Vec<String> {
    pairs
        .flat_map(|(en, ja)| [en, ja])
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}
