//! Batch orchestration: `pocer run`.

use anyhow::{Context, Result};
use pocer::config::Config;
use pocer::logging::RunLog;
use pocer::target::Target;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::super::Cli;

/// Run every resolved target through the attempt loop.
///
/// Returns `Ok(false)` when any target failed, so the caller can exit
/// non-zero after the summary has been printed.
pub async fn run_batch(
    cli: &Cli,
    project_dir: PathBuf,
    file: Option<&str>,
    attempts: Option<u32>,
    fail_fast: bool,
) -> Result<bool> {
    use pocer::target::resolve_targets;

    let config = Config::new(project_dir, cli.verbose, attempts)?;
    if config.max_attempts == 0 {
        anyhow::bail!("Attempt budget must be at least 1");
    }

    let targets = resolve_targets(&config.src_dir, file)?;
    if targets.is_empty() {
        anyhow::bail!(
            "No .sol files found in {}. Nothing to exploit.",
            config.src_dir.display()
        );
    }

    config.ensure_directories()?;
    let log = RunLog::init(&config.log_dir, cli.verbose)?;
    tracing::info!(
        project = %config.project_dir.display(),
        targets = targets.len(),
        max_attempts = config.max_attempts,
        "starting batch"
    );

    let result = execute(cli, &config, &targets, log.turn_dir(), fail_fast).await;
    if let Err(e) = &result {
        tracing::error!("batch failed: {:#}", e);
    }
    let success = matches!(result, Ok(true));
    match log.finish(success) {
        Ok(log_path) => println!("Log: {}", log_path.display()),
        Err(e) if result.is_ok() => return Err(e),
        Err(e) => eprintln!("Failed to move run log: {:#}", e),
    }

    result
}

/// Everything between log setup and log teardown. Any error here still
/// leaves the run log in `failures/`.
async fn execute(
    cli: &Cli,
    config: &Config,
    targets: &[Target],
    turn_dir: &Path,
    fail_fast: bool,
) -> Result<bool> {
    use pocer::analysis::StaticAnalysis;
    use pocer::artifact::ArtifactStore;
    use pocer::audit::{AuditLogger, RunConfig};
    use pocer::forge::ForgeRunner;
    use pocer::imports::ImportResolver;
    use pocer::orchestrator::{Orchestrator, StateManager};
    use pocer::stage::{ClaudeBuilder, ClaudeHacker, ClaudeRunner, ForgeTester, SourceContext};
    use pocer::ui::OrchestratorUI;

    println!("Running static analysis...");
    let analysis = StaticAnalysis::load(config)
        .await
        .context("Static analysis failed")?;
    tracing::info!(files = analysis.file_count(), "static analysis loaded");

    let ui = Arc::new(OrchestratorUI::new(targets.len() as u64, cli.verbose));
    let store = Arc::new(ArtifactStore::new(&config.test_dir, &config.exploit_dir));
    let sources = SourceContext::new(
        config.src_dir.clone(),
        Arc::new(analysis),
        Arc::new(ImportResolver::new()),
    );
    let claude = Arc::new(
        ClaudeRunner::new(config, Some(ui.clone())).with_turn_dir(turn_dir.to_path_buf()),
    );
    let forge = ForgeRunner::new(
        config.forge_cmd.clone(),
        config.project_dir.clone(),
        config.output_limit,
    );

    let builder = ClaudeBuilder::new(
        claude.clone(),
        sources.clone(),
        store.clone(),
        config.builder.clone(),
    );
    let hacker = ClaudeHacker::new(
        claude.clone(),
        sources.clone(),
        store.clone(),
        config.hacker.clone(),
    );
    let tester = ForgeTester::new(forge, claude, sources, store.clone(), config.tester.clone());

    let mut audit = AuditLogger::new(&config.audit_dir);
    audit.start_run(RunConfig {
        max_attempts: config.max_attempts,
        fail_fast,
        skip_permissions: config.skip_permissions,
        verbose: cli.verbose,
        project_dir: config.project_dir.clone(),
        claude_cmd: config.claude_cmd.clone(),
        forge_cmd: config.forge_cmd.clone(),
    })?;

    let orchestrator = Orchestrator::new(builder, hacker, tester, store)
        .with_ui(Some(ui.clone()))
        .with_state(StateManager::new(config.state_file.clone()))
        .with_audit(audit);

    let outcome = orchestrator
        .run_batch(targets, config.max_attempts, fail_fast)
        .await?;

    ui.finish();
    ui.print_summary(&outcome.succeeded_targets, &outcome.failed_targets);
    if outcome.stopped_early {
        println!(
            "Stopped early: {} target(s) not attempted.",
            targets.len() - outcome.succeeded_targets.len() - outcome.failed_targets.len()
        );
    }

    if let Some(mut audit) = orchestrator.into_audit() {
        let run_file = audit.finish_run()?;
        println!("Audit: {}", run_file.display());
    }

    Ok(outcome.is_success())
}
