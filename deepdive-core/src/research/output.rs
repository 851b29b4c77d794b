//! Research report rendering in multiple output formats.

use super::session::{ResearchStage, ResearchState};
use super::sources::SourceList;
use super::synthesis::ResearchReport;
use crate::error::{ConfigError, DeepdiveError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for research reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable report with a numbered source list.
    #[default]
    Markdown,
    /// Machine-readable document with the report, sources, and outcome.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => f.write_str("markdown"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Invalid {
                message: format!("unknown output format '{other}' (expected markdown or json)"),
            }),
        }
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    topic: &'a str,
    stage: ResearchStage,
    iterations: usize,
    report: Option<&'a ResearchReport>,
    sources: &'a SourceList,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Renders the outcome of a research run.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Render `state` in the given format.
    ///
    /// A run without a report renders its error (or stage) in place of the
    /// report body.
    pub fn generate(state: &ResearchState, format: OutputFormat) -> Result<String, DeepdiveError> {
        match format {
            OutputFormat::Markdown => Ok(Self::generate_markdown(state)),
            OutputFormat::Json => Self::generate_json(state),
        }
    }

    fn generate_markdown(state: &ResearchState) -> String {
        let Some(report) = state.report() else {
            let reason = state
                .error()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Run ended in stage '{}'", state.stage()));
            return format!("# Research failed: {}\n\n{reason}\n", state.topic());
        };

        let mut out = format!("# {}\n\n", report.title);
        out.push_str(report.summary.trim());
        out.push_str("\n\n");

        for section in &report.sections {
            out.push_str(&format!("## {}\n\n", section.heading));
            out.push_str(section.content.trim());
            out.push_str("\n\n");
        }

        if !state.sources().is_empty() {
            out.push_str("## Sources\n\n");
            for (i, source) in state.sources().iter().enumerate() {
                let title = if source.title.is_empty() {
                    &source.uri
                } else {
                    &source.title
                };
                out.push_str(&format!("{}. [{}]({})\n", i + 1, title, source.uri));
            }
        }

        out
    }

    fn generate_json(state: &ResearchState) -> Result<String, DeepdiveError> {
        let doc = JsonDocument {
            topic: state.topic(),
            stage: state.stage(),
            iterations: state.iteration(),
            report: state.report(),
            sources: state.sources(),
            error: state.error(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}
