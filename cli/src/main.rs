//! CLI entrypoint for gatekeeper
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use gatekeeper_application::{
    AuditSink, FeedbackCollector, LedgerRecorder, LessonsRepository, NoProgress, PhaseOutcome,
    WorkflowEngine, WorkflowProgressNotifier, WorkflowStateStore,
};
use gatekeeper_domain::{
    SessionSummary, TerminalKind, WorkflowMode, WorkflowState, seed_builtin_rules,
};
use gatekeeper_infrastructure::config::FileLoggingConfig;
use gatekeeper_infrastructure::{
    AgentDirectory, AnthropicAgentInvoker, ConfigLoader, FileConfig,
    JsonLessonsRepository, JsonStateStore, JsonlLedger, SourceScanner, latest_session,
    read_session_events,
};
use gatekeeper_presentation::{
    Cli, Command, ConsoleEscalation, ConsoleFormatter, OutputFormat, ProgressReporter,
    SimpleProgress, StatusView,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// What a workflow command asks the engine to do.
enum WorkflowAction {
    Start { feature: String },
    Ingest { source: PathBuf },
    Resume,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{line}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_logging(cli.verbose, &config.logging);
    info!("Starting gatekeeper");

    check_config(&config)?;

    let Some(command) = cli.command else {
        bail!("No command given. Run `gatekeeper --help` for usage.");
    };

    match command {
        Command::Start { project, feature } => {
            run_workflow(&config, cli.quiet, &project, WorkflowAction::Start { feature }).await
        }
        Command::Ingest { project, source } => {
            run_workflow(&config, cli.quiet, &project, WorkflowAction::Ingest { source }).await
        }
        Command::Resume { project } => {
            run_workflow(&config, cli.quiet, &project, WorkflowAction::Resume).await
        }
        Command::Status { project, output } => {
            show_status(&config, &project, output).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Lessons { step } => {
            show_lessons(&config, step.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn filter_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    }
}

/// Console logging from `-v`, plus a daily file when `[logging] dir` is set.
fn init_logging(verbose: u8, logging: &FileLoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::new(filter_directive(verbose));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file = logging.dir.as_deref().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("gatekeeper")
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| eprintln!("warning: file logging disabled ({}): {}", dir.display(), e))
            .ok()
    });

    match file {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}

/// Print every config issue; refuse to run when any of them is an error.
fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        let label = if issue.is_error() { "error" } else { "warning" };
        eprintln!("config {label}: {issue}");
    }
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        bail!("Configuration has {errors} error(s); fix them or run with --no-config");
    }
    Ok(())
}

fn exit_code(outcome: &PhaseOutcome) -> ExitCode {
    match outcome {
        PhaseOutcome::Finished(TerminalKind::Complete) => ExitCode::SUCCESS,
        PhaseOutcome::Escalated { .. } | PhaseOutcome::Finished(TerminalKind::Escalated) => {
            ExitCode::from(2)
        }
        PhaseOutcome::Failed { .. } | PhaseOutcome::Finished(TerminalKind::Failed) => {
            ExitCode::from(3)
        }
        PhaseOutcome::Cancelled { .. } => ExitCode::from(130),
        // run_to_completion never stops on these.
        PhaseOutcome::Advanced { .. } | PhaseOutcome::Stalled { .. } => ExitCode::SUCCESS,
    }
}

fn progress_notifier(quiet: bool) -> Arc<dyn WorkflowProgressNotifier> {
    if quiet {
        Arc::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Arc::new(ProgressReporter::new())
    } else {
        Arc::new(SimpleProgress)
    }
}

/// Cancel `token` on the first Ctrl-C.
fn watch_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step; progress will be saved...");
            token.cancel();
        }
    })
}

async fn run_workflow(
    config: &FileConfig,
    quiet: bool,
    project: &str,
    action: WorkflowAction,
) -> Result<ExitCode> {
    let store = Arc::new(JsonStateStore::new(&config.engine.projects_dir));
    let project_dir = store.project_dir(project)?;

    match (&action, store.load(project).await?) {
        (WorkflowAction::Resume, None) => {
            bail!("No saved workflow for {project}. Start one with `gatekeeper start`.")
        }
        (WorkflowAction::Start { .. } | WorkflowAction::Ingest { .. }, Some(existing))
            if !existing.is_finished() =>
        {
            bail!(
                "{project} already has a workflow at {}; use `gatekeeper resume {project}`",
                existing.current_phase
            )
        }
        _ => {}
    }

    // The ingest source is scanned before anything is written.
    let assessment_context = match &action {
        WorkflowAction::Ingest { source } => Some(
            SourceScanner::new()
                .assessment_context(project, source)
                .with_context(|| format!("Cannot assess {}", source.display()))?,
        ),
        _ => None,
    };

    let (gates, _) = config.gate_catalog();
    let (params, _) = config.engine_params();
    let (pricing, _) = config.pricing_table();

    // === Dependency Injection ===
    let directory = AgentDirectory::new(&config.provider, config.agents.clone());
    let invoker = Arc::new(AnthropicAgentInvoker::new(&config.provider, directory)?);

    let ledger = Arc::new(JsonlLedger::open(&project_dir, project)?);
    info!("Ledger session {} at {}", ledger.session_id(), ledger.path().display());
    let recorder = Arc::new(LedgerRecorder::new(ledger, pricing));

    let lessons = Arc::new(JsonLessonsRepository::new(config.lessons_path()));
    let collector = Arc::new(FeedbackCollector::new(lessons, params.learning.clone()));

    let token = CancellationToken::new();
    let watcher = watch_ctrl_c(token.clone());

    let mut engine = WorkflowEngine::new(
        invoker,
        Arc::clone(&recorder),
        store.clone(),
        gates,
        params,
    )
    .with_collector(collector)
    .with_escalation(Arc::new(ConsoleEscalation::new()))
    .with_progress(progress_notifier(quiet))
    .with_cancellation(token);
    if let Some(context) = assessment_context {
        engine = engine.with_assessment_context(context);
    }

    let run = async {
        let mut state = match &action {
            WorkflowAction::Start { feature } => {
                engine.start(project, WorkflowMode::Feature, feature).await?
            }
            WorkflowAction::Ingest { source } => {
                let source = std::fs::canonicalize(source).unwrap_or_else(|_| source.clone());
                let source = source.display().to_string();
                engine.start(project, WorkflowMode::Ingest, &source).await?
            }
            WorkflowAction::Resume => engine.resume(project).await?,
        };
        let outcome = engine.run_to_completion(&mut state).await?;
        Ok::<(WorkflowState, PhaseOutcome), anyhow::Error>((state, outcome))
    }
    .await;
    watcher.abort();

    // The session is closed even when the run failed.
    let summary = match recorder.finalize() {
        Ok(summary) => Some(summary),
        Err(e) if run.is_err() => {
            warn!("Could not finalize ledger session: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let (state, outcome) = run?;
    print!("{}", ConsoleFormatter::outcome(&state, &outcome));
    if state.mode == WorkflowMode::Ingest
        && let Some(report) = ConsoleFormatter::assessment(&state)
    {
        print!("{report}");
    }
    if let Some(summary) = summary {
        print_session_totals(&summary);
    }
    Ok(exit_code(&outcome))
}

fn print_session_totals(summary: &SessionSummary) {
    println!(
        "Session {}: {} agent call(s), {} vote(s), {} tokens, ${:.4}",
        summary.session_id,
        summary.agent_calls,
        summary.gate_votes,
        summary.total_tokens(),
        summary.total_cost_usd
    );
}

/// Saved state plus a replay of the latest ledger session.
async fn status_view(config: &FileConfig, project: &str) -> Result<StatusView> {
    let store = JsonStateStore::new(&config.engine.projects_dir);
    let project_dir = store.project_dir(project)?;
    let state = store.load(project).await?;
    let session = session_summary(&project_dir);
    Ok(StatusView::new(project, state.as_ref(), session))
}

fn session_summary(project_dir: &Path) -> Option<SessionSummary> {
    let session_id = latest_session(project_dir)?;
    SessionSummary::replay(&read_session_events(project_dir, &session_id))
}

async fn show_status(config: &FileConfig, project: &str, output: OutputFormat) -> Result<()> {
    let view = status_view(config, project).await?;
    match output {
        OutputFormat::Text => print!("{}", ConsoleFormatter::status(&view)),
        OutputFormat::Json => println!("{}", view.to_json()),
    }
    Ok(())
}

async fn show_lessons(config: &FileConfig, step: Option<&str>) -> Result<()> {
    let repository = JsonLessonsRepository::new(config.lessons_path());
    let mut doc = repository
        .load()
        .await
        .with_context(|| format!("Cannot read {}", repository.path().display()))?;
    // Shown, never saved: the collector persists the seeded rules on first use.
    seed_builtin_rules(&mut doc, Utc::now());

    match step {
        Some(step) => print!(
            "{}",
            ConsoleFormatter::step_lessons(step, doc.lessons_for(step), doc.rules_for(step))
        ),
        None => print!("{}", ConsoleFormatter::lessons(&doc.stats())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_domain::{AuditEvent, EventKind, WorkflowPhase};

    fn config_in(dir: &Path) -> FileConfig {
        let mut config = FileConfig::default();
        config.engine.projects_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_verbosity_maps_to_filter() {
        assert_eq!(filter_directive(0), "warn");
        assert_eq!(filter_directive(1), "info");
        assert_eq!(filter_directive(2), "debug");
        assert_eq!(filter_directive(9), "trace");
    }

    #[test]
    fn test_exit_codes_distinguish_stops() {
        assert_eq!(
            exit_code(&PhaseOutcome::Finished(TerminalKind::Complete)),
            ExitCode::SUCCESS
        );
        assert_eq!(
            exit_code(&PhaseOutcome::Escalated {
                phase: WorkflowPhase::CodeReview,
                gate_id: "code_review".into(),
            }),
            ExitCode::from(2)
        );
        assert_eq!(
            exit_code(&PhaseOutcome::Failed {
                phase: WorkflowPhase::Development,
                reason: "attempts exhausted".into(),
            }),
            ExitCode::from(3)
        );
        assert_eq!(
            exit_code(&PhaseOutcome::Cancelled {
                phase: WorkflowPhase::Testing
            }),
            ExitCode::from(130)
        );
    }

    #[test]
    fn test_default_config_passes_check() {
        assert!(check_config(&FileConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_status_view_for_unknown_project() {
        let dir = tempfile::tempdir().unwrap();
        let view = status_view(&config_in(dir.path()), "ghost").await.unwrap();
        assert!(!view.has_state());
        assert!(view.session.is_none());
    }

    #[tokio::test]
    async fn test_status_view_replays_latest_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = JsonStateStore::new(dir.path());
        let state = WorkflowState::new("wishlist", WorkflowMode::Feature, "Save products");
        store.save(&state).await.unwrap();

        let project_dir = store.project_dir("wishlist").unwrap();
        let ledger = JsonlLedger::open(&project_dir, "wishlist").unwrap();
        let event = AuditEvent::new(
            EventKind::PhaseChange,
            ledger.session_id(),
            "wishlist",
            Utc::now(),
        )
        .with_phase("ideation");
        ledger.append(event).unwrap();
        ledger.finalize().unwrap();

        let view = status_view(&config, "wishlist").await.unwrap();
        assert_eq!(view.phase, Some(WorkflowPhase::Ideation));
        let session = view.session.unwrap();
        assert_eq!(session.phase_changes, 1);
        assert!(session.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_status_rejects_path_like_project_ids() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status_view(&config_in(dir.path()), "../escape").await.is_err());
    }
}
