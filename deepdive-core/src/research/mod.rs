//! Bilingual research pipeline.
//!
//! A run moves through these stages:
//! 1. **Plan** — break the topic into English/Japanese question pairs
//! 2. **Search** — one grounded web search per phrasing, strictly in order
//! 3. **Evaluate** — judge whether the evidence answers the plan
//! 4. **Refine** — turn unanswered questions into new queries, then search again
//! 5. **Synthesize** — write the final report from the accumulated evidence
//!
//! Steps 2–4 repeat for at most `max_iterations` rounds.

pub mod engine;
pub mod evaluation;
pub mod evidence;
pub mod output;
pub mod planner;
pub mod prompts;
pub mod search;
pub mod session;
pub mod sources;
pub mod synthesis;

pub use engine::ResearchEngine;
pub use evaluation::{Evaluation, Evaluator, RefinedQuery};
pub use evidence::EvidenceBuffer;
pub use output::{OutputFormat, ReportGenerator};
pub use planner::{ResearchPlanItem, ResearchPlanner};
pub use search::{SearchOutcome, Searcher};
pub use session::{
    ChannelResearchCallback, LogEntry, LogLevel, NoOpResearchCallback, RecordingResearchCallback,
    ResearchCallback, ResearchEvent, ResearchStage, ResearchState,
};
pub use sources::SourceList;
pub use synthesis::{ReportSection, ResearchReport, ResearchSynthesizer};
