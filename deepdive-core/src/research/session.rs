//! Research run state and the event stream it produces.
//!
//! `ResearchState` is only mutated by the engine. Presentation layers follow
//! a run through `ResearchCallback`, which receives every `ResearchEvent` in
//! the order the engine emits them.

use super::evaluation::{Evaluation, RefinedQuery};
use super::evidence::EvidenceBuffer;
use super::planner::ResearchPlanItem;
use super::sources::SourceList;
use super::synthesis::ResearchReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Current stage of a research run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStage {
    /// No run in progress.
    Idle,
    /// Generating the research plan.
    Planning,
    /// Executing the active queries.
    Searching,
    /// Judging evidence completeness.
    Evaluating,
    /// Writing the final report.
    Synthesizing,
    /// Report ready.
    Complete,
    /// Run failed. Only a reset leaves this stage.
    Error,
}

impl ResearchStage {
    /// Whether a run in this stage has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, ResearchStage::Complete | ResearchStage::Error)
    }
}

impl fmt::Display for ResearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchStage::Idle => "idle",
            ResearchStage::Planning => "planning",
            ResearchStage::Searching => "searching",
            ResearchStage::Evaluating => "evaluating",
            ResearchStage::Synthesizing => "synthesizing",
            ResearchStage::Complete => "complete",
            ResearchStage::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of the human-readable run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    id: Uuid,
    topic: String,
    stage: ResearchStage,
    plan: Vec<ResearchPlanItem>,
    evidence: EvidenceBuffer,
    sources: SourceList,
    report: Option<ResearchReport>,
    error: Option<String>,
    /// Rounds started so far (1-based once searching begins).
    iteration: usize,
    max_iterations: usize,
    log: Vec<LogEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResearchState {
    /// The state before any run, and after a reset.
    pub fn idle() -> Self {
        Self::new("", 0)
    }

    pub(crate) fn new(topic: impl Into<String>, max_iterations: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            stage: ResearchStage::Idle,
            plan: Vec::new(),
            evidence: EvidenceBuffer::new(),
            sources: SourceList::new(),
            report: None,
            error: None,
            iteration: 0,
            max_iterations,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stage(&self) -> ResearchStage {
        self.stage
    }

    pub fn plan(&self) -> &[ResearchPlanItem] {
        &self.plan
    }

    pub fn evidence(&self) -> &EvidenceBuffer {
        &self.evidence
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    pub fn report(&self) -> Option<&ResearchReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Overall progress in `0.0..=1.0`, derived from stage and iteration.
    pub fn progress(&self) -> f64 {
        let rounds = self.max_iterations.max(1) as f64;
        let round = self.iteration.saturating_sub(1) as f64;
        match self.stage {
            ResearchStage::Idle => 0.0,
            ResearchStage::Planning => 0.05,
            ResearchStage::Searching => 0.1 + 0.7 * (round / rounds),
            ResearchStage::Evaluating => 0.1 + 0.7 * ((round + 0.8) / rounds),
            ResearchStage::Synthesizing => 0.9,
            ResearchStage::Complete => 1.0,
            ResearchStage::Error => self.progress_before_error(),
        }
    }

    fn progress_before_error(&self) -> f64 {
        if self.iteration == 0 {
            0.0
        } else {
            (0.1 + 0.7 * (self.iteration as f64 / self.max_iterations.max(1) as f64)).min(0.9)
        }
    }

    pub(crate) fn transition(&mut self, stage: ResearchStage) {
        self.stage = stage;
        self.touch();
    }

    pub(crate) fn set_plan(&mut self, plan: Vec<ResearchPlanItem>) {
        self.plan = plan;
        self.touch();
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.touch();
        self.iteration
    }

    /// Record a query result. Returns how many sources were new.
    pub(crate) fn record_result(
        &mut self,
        query: &str,
        text: &str,
        sources: Vec<crate::types::Source>,
    ) -> usize {
        self.evidence.append(query, text);
        let added = self.sources.merge(sources);
        self.touch();
        added
    }

    pub(crate) fn set_report(&mut self, report: ResearchReport) {
        self.report = Some(report);
        self.touch();
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.stage = ResearchStage::Error;
        self.touch();
    }

    pub(crate) fn push_log(&mut self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };
        self.log.push(entry.clone());
        entry
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ResearchState {
    fn default() -> Self {
        Self::idle()
    }
}

/// A notification emitted by the engine as a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchEvent {
    StageChanged {
        stage: ResearchStage,
        progress: f64,
    },
    /// A line appended to the run log.
    Log(LogEntry),
    PlanReady {
        plan: Vec<ResearchPlanItem>,
    },
    IterationStarted {
        iteration: usize,
        max_iterations: usize,
        queries: usize,
    },
    QueryCompleted {
        query: String,
        new_sources: usize,
        total_sources: usize,
    },
    QueryFailed {
        query: String,
        error: String,
    },
    Evaluated {
        iteration: usize,
        evaluation: Evaluation,
    },
    QueriesRefined {
        queries: Vec<RefinedQuery>,
    },
    ReportReady {
        report: ResearchReport,
    },
    Failed {
        error: String,
    },
}

/// Receives research events in emission order.
pub trait ResearchCallback: Send + Sync {
    fn on_event(&self, event: &ResearchEvent);
}

/// Ignores every event.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_event(&self, _event: &ResearchEvent) {}
}

/// Forwards events into an unbounded channel for an async subscriber.
///
/// Events are dropped silently once the receiver is gone.
pub struct ChannelResearchCallback {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChannelResearchCallback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResearchCallback for ChannelResearchCallback {
    fn on_event(&self, event: &ResearchEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Records every event for test assertions.
#[derive(Default)]
pub struct RecordingResearchCallback {
    events: Mutex<Vec<ResearchEvent>>,
}

impl RecordingResearchCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResearchEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<ResearchStage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResearchEvent::StageChanged { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    /// Messages of log lines at `level`, in order.
    pub fn log_messages(&self, level: LogLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ResearchEvent::Log(entry) if entry.level == level => Some(entry.message),
                _ => None,
            })
            .collect()
    }
}

impl ResearchCallback for RecordingResearchCallback {
    fn on_event(&self, event: &ResearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
