//! Final report synthesis from the accumulated evidence.

use super::prompts;
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One titled section of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub heading: String,
    pub content: String,
}

/// The terminal artifact of a research run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub title: String,
    pub summary: String,
    pub sections: Vec<ReportSection>,
}

/// Writes the report for a topic.
pub struct ResearchSynthesizer {
    brain: Arc<Brain>,
    model: Option<String>,
    language: String,
}

impl ResearchSynthesizer {
    pub fn new(brain: Arc<Brain>, config: &ResearchConfig) -> Self {
        Self {
            brain,
            model: config.model.clone(),
            language: config.report_language.clone(),
        }
    }

    /// Synthesize a report on `topic` from `evidence`.
    ///
    /// A report without a title is treated as malformed.
    pub async fn synthesize(&self, topic: &str, evidence: &str) -> Result<ResearchReport, LlmError> {
        let report: ResearchReport = self
            .brain
            .generate_structured(
                prompts::SYNTHESIZER_SYSTEM,
                &prompts::synthesis_prompt(topic, evidence, &self.language),
                prompts::synthesis_schema(),
                "research report",
                self.model.clone(),
            )
            .await?;
        if report.title.trim().is_empty() {
            return Err(LlmError::MalformedOutput {
                expected: "research report".to_string(),
                message: "report has no title".to_string(),
            });
        }
        info!(
            title = %report.title,
            sections = report.sections.len(),
            "Report synthesized"
        );
        Ok(report)
    }
}
