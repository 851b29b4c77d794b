//! Research planning: break a topic into bilingual research questions.

use super::prompts;
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One research question, phrased in English and Japanese.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlanItem {
    pub english_question: String,
    pub japanese_question: String,
}

impl ResearchPlanItem {
    pub fn new(english: impl Into<String>, japanese: impl Into<String>) -> Self {
        Self {
            english_question: english.into(),
            japanese_question: japanese.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.english_question.trim().is_empty() && self.japanese_question.trim().is_empty()
    }
}

#[derive(Deserialize)]
struct PlanResponse {
    plan: Vec<ResearchPlanItem>,
}

/// Produces the research plan for a topic.
pub struct ResearchPlanner {
    brain: Arc<Brain>,
    model: Option<String>,
    min_items: usize,
    max_items: usize,
}

impl ResearchPlanner {
    pub fn new(brain: Arc<Brain>, config: &ResearchConfig) -> Self {
        Self {
            brain,
            model: config.model.clone(),
            min_items: config.min_plan_items.max(1),
            max_items: config.max_plan_items.max(config.min_plan_items).max(1),
        }
    }

    /// Generate the plan for `topic`.
    ///
    /// An unparseable response or a plan with no usable questions is
    /// `LlmError::MalformedOutput`. Extra items beyond the configured maximum
    /// are dropped.
    pub async fn plan(&self, topic: &str) -> Result<Vec<ResearchPlanItem>, LlmError> {
        let response: PlanResponse = self
            .brain
            .generate_structured(
                prompts::PLANNER_SYSTEM,
                &prompts::plan_prompt(topic, self.min_items, self.max_items),
                prompts::plan_schema(self.min_items, self.max_items),
                "research plan",
                self.model.clone(),
            )
            .await?;

        let mut plan: Vec<ResearchPlanItem> = response
            .plan
            .into_iter()
            .filter(|item| !item.is_blank())
            .collect();

        if plan.is_empty() {
            return Err(LlmError::MalformedOutput {
                expected: "research plan".to_string(),
                message: "plan contains no questions".to_string(),
            });
        }
        if plan.len() < self.min_items {
            warn!(
                items = plan.len(),
                min = self.min_items,
                "Planner returned fewer questions than requested"
            );
        }
        plan.truncate(self.max_items);

        info!(items = plan.len(), "Research plan ready");
        Ok(plan)
    }
}
