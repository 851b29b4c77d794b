//! One-shot research runner with live progress on stderr.

use deepdive_core::research::{LogLevel, ReportGenerator};
use deepdive_core::{
    AppConfig, Brain, ResearchCallback, ResearchEngine, ResearchEvent, ResearchStage,
};
use std::sync::Arc;

/// Prints research progress to stderr.
pub(crate) struct CliResearchCallback {
    quiet: bool,
}

impl ResearchCallback for CliResearchCallback {
    fn on_event(&self, event: &ResearchEvent) {
        if self.quiet {
            return;
        }
        if let Some(line) = describe(event) {
            eprintln!("{line}");
        }
    }
}

/// One progress line per event worth showing.
pub(crate) fn describe(event: &ResearchEvent) -> Option<String> {
    match event {
        ResearchEvent::StageChanged { stage, progress } => Some(format!(
            "\x1b[1;36m[{:>3.0}%] {stage}\x1b[0m",
            progress * 100.0
        )),
        ResearchEvent::Log(entry) => match entry.level {
            LogLevel::Info => Some(format!("\x1b[90m  {}\x1b[0m", entry.message)),
            LogLevel::Warn => Some(format!("\x1b[33m  warning: {}\x1b[0m", entry.message)),
            LogLevel::Error => Some(format!("\x1b[31m  error: {}\x1b[0m", entry.message)),
        },
        ResearchEvent::PlanReady { plan } => Some(
            plan.iter()
                .enumerate()
                .map(|(i, item)| {
                    format!(
                        "  {}. {}\n     {}",
                        i + 1,
                        item.english_question,
                        item.japanese_question
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        ResearchEvent::QueryCompleted {
            query,
            new_sources,
            total_sources,
        } => Some(format!(
            "\x1b[90m  ✓ {query} (+{new_sources} sources, {total_sources} total)\x1b[0m"
        )),
        ResearchEvent::Evaluated { evaluation, .. } if !evaluation.is_complete => Some(format!(
            "\x1b[90m  {} questions still open: {}\x1b[0m",
            evaluation.unanswered_questions.len(),
            evaluation.reasoning
        )),
        // Failures are covered by the log line emitted alongside.
        _ => None,
    }
}

pub async fn run_research(
    topic: &str,
    config: AppConfig,
    brain: Arc<Brain>,
    quiet: bool,
) -> anyhow::Result<()> {
    let format = config.research.output_format;
    let callback = Arc::new(CliResearchCallback { quiet });
    let engine = Arc::new(ResearchEngine::new(
        brain.clone(),
        config.research,
        callback,
    ));

    let run = {
        let engine = engine.clone();
        let topic = topic.to_string();
        tokio::spawn(async move { engine.run(&topic).await })
    };

    // Ctrl-C stops further calls; the in-flight one is left to finish.
    let interrupt = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n\x1b[33m  Interrupted, stopping after the current call...\x1b[0m");
                engine.reset();
            }
        })
    };

    let state = run.await??;
    interrupt.abort();

    if state.stage() == ResearchStage::Idle {
        eprintln!("Research cancelled.");
        return Ok(());
    }

    println!("{}", ReportGenerator::generate(&state, format)?);

    if !quiet {
        let usage = brain.total_usage();
        eprintln!(
            "\x1b[90m  [{} rounds | {} sources | tokens: {} in / {} out]\x1b[0m",
            state.iteration(),
            state.sources().len(),
            usage.input_tokens,
            usage.output_tokens
        );
    }

    if let Some(error) = state.error() {
        anyhow::bail!("research failed: {error}");
    }
    Ok(())
}
