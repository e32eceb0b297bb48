use super::{AuditRun, RunConfig, TargetAudit};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Persists the active [`AuditRun`] to `current-run.json` after every change
/// and moves it to `runs/<timestamp>_<id>.json` when the run finishes.
pub struct AuditLogger {
    audit_dir: PathBuf,
    current_run: Option<AuditRun>,
    current_run_file: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        let current_run_file = audit_dir.join("current-run.json");
        Self {
            audit_dir: audit_dir.to_path_buf(),
            current_run: None,
            current_run_file,
        }
    }

    pub fn start_run(&mut self, config: RunConfig) -> Result<()> {
        self.current_run = Some(AuditRun::new(config));
        self.save_current()
    }

    /// Add a target record to the current run.
    ///
    /// Returns an error if no run is active.
    pub fn add_target(&mut self, target: TargetAudit) -> Result<()> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("add_target called with no active run"))?;
        run.targets.push(target);
        self.save_current()
    }

    /// Apply a mutation to the last target in the current run.
    ///
    /// Returns an error if no run is active or the run has no targets yet.
    pub fn update_last_target<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut TargetAudit),
    {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("update_last_target called with no active run"))?;
        let target = run
            .targets
            .last_mut()
            .ok_or_else(|| anyhow::anyhow!("update_last_target called with no targets in run"))?;
        f(target);
        self.save_current()
    }

    pub fn finish_run(&mut self) -> Result<PathBuf> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No current run to finish"))?;

        run.finish();

        let filename = format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.to_string()[..8]
        );
        let runs_dir = self.audit_dir.join("runs");
        fs::create_dir_all(&runs_dir).context("Failed to create audit runs directory")?;
        let run_file = runs_dir.join(&filename);

        let json = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
        fs::write(&run_file, json).context("Failed to write audit run file")?;

        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file)
                .context("Failed to remove current-run.json after finishing run")?;
        }

        self.current_run = None;
        Ok(run_file)
    }

    pub fn save_current(&self) -> Result<()> {
        if let Some(ref run) = self.current_run {
            fs::create_dir_all(&self.audit_dir).context("Failed to create audit directory")?;
            let json =
                serde_json::to_string_pretty(run).context("Failed to serialize current run")?;
            fs::write(&self.current_run_file, json).context("Failed to write current run file")?;
        }
        Ok(())
    }

    pub fn current_run(&self) -> Option<&AuditRun> {
        self.current_run.as_ref()
    }

    /// Finished runs, most recent first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.audit_dir.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&runs_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse();
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path).context("Failed to read audit run file")?;
        serde_json::from_str(&content).context("Failed to parse audit run file")
    }
}
