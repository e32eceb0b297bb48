//! Target listing, status and reset commands.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;

pub fn cmd_list(project_dir: &Path) -> Result<()> {
    use pocer::config::Config;
    use pocer::target::{ArtifactKind, discover_targets};

    let config = Config::new(project_dir.to_path_buf(), false, None)?;
    let targets = discover_targets(&config.src_dir)?;

    println!();
    if targets.is_empty() {
        println!("No targets found in {}", config.src_dir.display());
        println!();
        return Ok(());
    }

    println!("Targets in {}:", config.src_dir.display());
    println!();
    println!("{:<30} {:<30} Exploit", "Target", "Test");
    println!("{:<30} {:<30} -------", "------", "----");
    for target in &targets {
        let test = target.artifact_file_name(ArtifactKind::Test);
        let exploit = target.artifact_file_name(ArtifactKind::Exploit);
        let mark = |exists: bool, name: String| {
            if exists {
                name
            } else {
                format!("{}", console::style(format!("({})", name)).dim())
            }
        };
        println!(
            "{:<30} {:<30} {}",
            target.file_name(),
            mark(config.test_dir.join(&test).exists(), test),
            mark(config.exploit_dir.join(&exploit).exists(), exploit),
        );
    }
    println!();
    println!("{} target(s)", targets.len());
    println!();
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use pocer::audit::AuditLogger;
    use pocer::config::Config;
    use pocer::orchestrator::StateManager;

    let config = Config::new(project_dir.to_path_buf(), false, None)?;

    println!();
    println!("Pocer Status");
    println!("============");
    println!();

    let state = StateManager::new(config.state_file.clone());
    let latest = state.latest_by_target()?;

    if latest.is_empty() {
        println!("Execution: Not started");
        println!();
        println!("Run 'pocer run' to start.");
        println!();
        return Ok(());
    }

    println!("{:<30} {:<8} {:<16} Updated", "Target", "Attempt", "Status");
    println!("{:<30} {:<8} {:<16} -------", "------", "-------", "------");
    for entry in latest.values() {
        let status = match entry.status.as_str() {
            "success" => console::style(entry.status.as_str()).green(),
            "exhausted" | "aborted" | "unknown" => console::style(entry.status.as_str()).red(),
            _ => console::style(entry.status.as_str()).yellow(),
        };
        println!(
            "{:<30} {:<8} {:<16} {}",
            entry.target,
            entry.attempt,
            status,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();

    let audit = AuditLogger::new(&config.audit_dir);
    let runs = audit.list_runs()?;
    if let Some(last) = runs.first()
        && let Ok(run) = audit.load_run(last)
    {
        println!(
            "Last run: {} ({} of {} targets exploited)",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.succeeded(),
            run.targets.len()
        );
        println!();
    }
    Ok(())
}

pub fn cmd_reset(project_dir: &Path, cli: &Cli, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use pocer::config::Config;
    use pocer::orchestrator::StateManager;

    let config = Config::new(project_dir.to_path_buf(), cli.verbose, None)?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will clear all recorded progress and logs. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let state = StateManager::new(config.state_file.clone());
    state.reset()?;

    let current_run = config.audit_dir.join("current-run.json");
    if current_run.exists() {
        std::fs::remove_file(&current_run).ok();
    }
    if config.log_dir.exists() {
        std::fs::remove_dir_all(&config.log_dir).ok();
    }

    println!("Reset complete");
    Ok(())
}
