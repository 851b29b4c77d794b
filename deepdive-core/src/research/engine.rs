//! Research engine: drives plan, search, evaluate, refine, and synthesize.
//!
//! A run is a single sequential flow. Every remote call is awaited before the
//! next one is issued, so the evidence buffer and source list are only ever
//! written from one place. At most `max_iterations` search+evaluate rounds run
//! before synthesis.

use super::evaluation::Evaluator;
use super::planner::ResearchPlanner;
use super::search::{Searcher, queries_from_plan, queries_from_refined};
use super::session::{
    LogLevel, ResearchCallback, ResearchEvent, ResearchStage, ResearchState,
};
use super::synthesis::ResearchSynthesizer;
use crate::brain::Brain;
use crate::config::ResearchConfig;
use crate::error::{LlmError, ResearchError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Clears the running flag when a run finishes, however it finishes.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The iteration controller for research runs.
pub struct ResearchEngine {
    config: ResearchConfig,
    planner: ResearchPlanner,
    searcher: Searcher,
    evaluator: Evaluator,
    synthesizer: ResearchSynthesizer,
    callback: Arc<dyn ResearchCallback>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    snapshot: Mutex<ResearchState>,
}

impl ResearchEngine {
    pub fn new(
        brain: Arc<Brain>,
        config: ResearchConfig,
        callback: Arc<dyn ResearchCallback>,
    ) -> Self {
        Self {
            planner: ResearchPlanner::new(brain.clone(), &config),
            searcher: Searcher::new(brain.clone(), config.model.clone()),
            evaluator: Evaluator::new(brain.clone(), &config),
            synthesizer: ResearchSynthesizer::new(brain, &config),
            config,
            callback,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            snapshot: Mutex::new(ResearchState::idle()),
        }
    }

    /// Number of search+evaluate rounds a run may use. Always at least one.
    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations.max(1)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The latest published state of the current or most recent run.
    pub fn state(&self) -> ResearchState {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Stop issuing remote calls and return to `Idle`.
    ///
    /// A call already in flight is not aborted; its result is discarded when
    /// it arrives.
    pub fn reset(&self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
        self.publish(&ResearchState::idle());
        info!("Research reset");
    }

    /// Research `topic` to completion.
    ///
    /// Stage failures do not surface as `Err`: the returned state is in
    /// `ResearchStage::Error` with the message recorded. A run interrupted by
    /// [`reset`](Self::reset) returns the idle state.
    pub async fn run(&self, topic: &str) -> Result<ResearchState, ResearchError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ResearchError::EmptyTopic);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ResearchError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        let token = self.fresh_token();

        let mut state = ResearchState::new(topic, self.max_iterations());
        info!(topic, max_iterations = state.max_iterations(), "Research run started");

        match self.drive(&mut state, &token).await {
            Ok(()) => {}
            Err(ResearchError::Reset) => {
                info!(topic, "Research run abandoned after reset");
                state = ResearchState::idle();
            }
            Err(e) => {
                let message = e.to_string();
                error!(topic, error = %message, "Research run failed");
                state.fail(message.clone());
                self.log(&mut state, LogLevel::Error, message.clone());
                self.emit(ResearchEvent::StageChanged {
                    stage: ResearchStage::Error,
                    progress: state.progress(),
                });
                self.emit(ResearchEvent::Failed { error: message });
            }
        }

        self.publish(&state);
        Ok(state)
    }

    async fn drive(
        &self,
        state: &mut ResearchState,
        token: &CancellationToken,
    ) -> Result<(), ResearchError> {
        self.enter(state, ResearchStage::Planning);
        let message = format!("Planning research on \"{}\"", state.topic());
        self.log(state, LogLevel::Info, message);
        let plan = self
            .call(token, "planning", self.planner.plan(state.topic()))
            .await?;
        self.log(
            state,
            LogLevel::Info,
            format!("Plan ready with {} questions", plan.len()),
        );
        let mut queries = queries_from_plan(&plan);
        self.emit(ResearchEvent::PlanReady { plan: plan.clone() });
        state.set_plan(plan);

        let max_iterations = self.max_iterations();
        loop {
            let iteration = state.begin_iteration();
            self.enter(state, ResearchStage::Searching);
            self.emit(ResearchEvent::IterationStarted {
                iteration,
                max_iterations,
                queries: queries.len(),
            });
            self.log(
                state,
                LogLevel::Info,
                format!(
                    "Round {iteration}/{max_iterations}: running {} searches",
                    queries.len()
                ),
            );
            self.search_all(state, &queries, token).await?;

            self.enter(state, ResearchStage::Evaluating);
            let evaluation = self
                .call(
                    token,
                    "evaluation",
                    self.evaluator
                        .evaluate(state.plan(), state.evidence().as_str()),
                )
                .await?;
            self.emit(ResearchEvent::Evaluated {
                iteration,
                evaluation: evaluation.clone(),
            });

            if evaluation.is_complete {
                self.log(
                    state,
                    LogLevel::Info,
                    format!("Evidence judged complete after round {iteration}"),
                );
                break;
            }
            if iteration >= max_iterations {
                self.log(
                    state,
                    LogLevel::Warn,
                    format!(
                        "Round limit reached with {} questions unanswered; synthesizing available evidence",
                        evaluation.unanswered_questions.len()
                    ),
                );
                break;
            }

            let refined = self
                .call(
                    token,
                    "query refinement",
                    self.evaluator.refine(&evaluation.unanswered_questions),
                )
                .await?;
            if refined.is_empty() {
                self.log(
                    state,
                    LogLevel::Info,
                    "No further queries proposed; synthesizing available evidence",
                );
                break;
            }
            queries = queries_from_refined(&refined);
            self.log(
                state,
                LogLevel::Info,
                format!("Refined {} follow-up queries", refined.len()),
            );
            self.emit(ResearchEvent::QueriesRefined { queries: refined });
        }

        self.enter(state, ResearchStage::Synthesizing);
        let report = self
            .call(
                token,
                "synthesis",
                self.synthesizer
                    .synthesize(state.topic(), state.evidence().as_str()),
            )
            .await?;
        self.emit(ResearchEvent::ReportReady {
            report: report.clone(),
        });
        state.set_report(report);
        self.enter(state, ResearchStage::Complete);
        let message = format!(
            "Research complete with {} sources from {} search results",
            state.sources().len(),
            state.evidence().entry_count()
        );
        self.log(state, LogLevel::Info, message);
        Ok(())
    }

    /// Run every query in order. A failed query is logged and skipped.
    async fn search_all(
        &self,
        state: &mut ResearchState,
        queries: &[String],
        token: &CancellationToken,
    ) -> Result<(), ResearchError> {
        for query in queries {
            ensure_active(token)?;
            let result = self.searcher.search(query).await;
            ensure_active(token)?;
            match result {
                Ok(outcome) => {
                    let new_sources = state.record_result(query, &outcome.text, outcome.sources);
                    self.emit(ResearchEvent::QueryCompleted {
                        query: query.clone(),
                        new_sources,
                        total_sources: state.sources().len(),
                    });
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed, skipping query");
                    self.log(
                        state,
                        LogLevel::Warn,
                        format!("Search failed for \"{query}\": {e}"),
                    );
                    self.emit(ResearchEvent::QueryFailed {
                        query: query.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Await a stage call unless a reset intervened, before or during it.
    async fn call<T>(
        &self,
        token: &CancellationToken,
        stage: &'static str,
        fut: impl Future<Output = Result<T, LlmError>>,
    ) -> Result<T, ResearchError> {
        ensure_active(token)?;
        let result = fut.await;
        ensure_active(token)?;
        result.map_err(|source| ResearchError::Stage { stage, source })
    }

    fn fresh_token(&self) -> CancellationToken {
        match self.cancel.lock() {
            Ok(mut token) => {
                if token.is_cancelled() {
                    *token = CancellationToken::new();
                }
                token.clone()
            }
            Err(_) => CancellationToken::new(),
        }
    }

    fn enter(&self, state: &mut ResearchState, stage: ResearchStage) {
        state.transition(stage);
        info!(stage = %stage, iteration = state.iteration(), "Research stage");
        self.publish(state);
        self.emit(ResearchEvent::StageChanged {
            stage,
            progress: state.progress(),
        });
    }

    fn log(&self, state: &mut ResearchState, level: LogLevel, message: impl Into<String>) {
        let entry = state.push_log(level, message);
        self.emit(ResearchEvent::Log(entry));
    }

    fn emit(&self, event: ResearchEvent) {
        self.callback.on_event(&event);
    }

    fn publish(&self, state: &ResearchState) {
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = state.clone();
        }
    }
}

fn ensure_active(token: &CancellationToken) -> Result<(), ResearchError> {
    if token.is_cancelled() {
        Err(ResearchError::Reset)
    } else {
        Ok(())
    }
}
