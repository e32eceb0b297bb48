//! Per-run log file.
//!
//! Every `pocer run` writes its `tracing` output to
//! `<log_dir>/<YYYY-MM-DD_HH-MM-SS>.log`, with model turn logs in the
//! directory of the same name. When the batch is over both are moved to
//! `successes/` or `failures/` depending on the batch outcome.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "POCER_LOG";

/// Handle on the active log file. Dropping it flushes pending lines.
pub struct RunLog {
    path: PathBuf,
    turn_dir: PathBuf,
    log_dir: PathBuf,
    guard: Option<WorkerGuard>,
}

impl RunLog {
    /// Install the global subscriber writing to a fresh timestamped file.
    ///
    /// The filter comes from `POCER_LOG`, falling back to `info` (or `debug`
    /// when `verbose`). If a global subscriber is already installed the file
    /// is still created but receives nothing.
    pub fn init(log_dir: &Path, verbose: bool) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let stem = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let path = log_dir.join(format!("{}.log", stem));
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);

        let default_level = if verbose { "debug" } else { "info" };
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init()
            .ok();

        Ok(Self {
            path,
            turn_dir: log_dir.join(stem),
            log_dir: log_dir.to_path_buf(),
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory for this run's model turn logs. Created lazily by the writer.
    pub fn turn_dir(&self) -> &Path {
        &self.turn_dir
    }

    /// Flush the log and move it, with the turn log directory if one was
    /// written, under `successes/` or `failures/`. Returns the log's final
    /// location.
    pub fn finish(mut self, success: bool) -> Result<PathBuf> {
        drop(self.guard.take());

        let bucket = self.log_dir.join(if success { "successes" } else { "failures" });
        if self.turn_dir.is_dir() {
            move_log(&self.turn_dir, &bucket)?;
        }
        move_log(&self.path, &bucket)
    }
}

/// Move a file or directory into `dest_dir`, keeping its name.
fn move_log(path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", path.display()))?;
    let dest = dest_dir.join(file_name);
    fs::rename(path, &dest)
        .with_context(|| format!("Failed to move log to {}", dest.display()))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_log_moves_to_bucket() {
        let dir = tempdir().unwrap();
        let log = RunLog::init(dir.path(), false).unwrap();
        let original = log.path().to_path_buf();
        assert!(original.exists());
        assert_eq!(original.extension().unwrap(), "log");

        let moved = log.finish(false).unwrap();
        assert!(!original.exists());
        assert!(moved.exists());
        assert_eq!(moved.parent().unwrap(), dir.path().join("failures"));
    }

    #[test]
    fn test_turn_logs_move_with_run_log() {
        let dir = tempdir().unwrap();
        let log = RunLog::init(dir.path(), false).unwrap();
        let turn_dir = log.turn_dir().to_path_buf();
        assert_eq!(turn_dir.parent().unwrap(), dir.path());
        fs::create_dir_all(&turn_dir).unwrap();
        fs::write(turn_dir.join("turn-001-builder-prompt.md"), "prompt").unwrap();

        log.finish(true).unwrap();
        let moved = dir
            .path()
            .join("successes")
            .join(turn_dir.file_name().unwrap())
            .join("turn-001-builder-prompt.md");
        assert_eq!(fs::read_to_string(moved).unwrap(), "prompt");
        assert!(!turn_dir.exists());
    }

    #[test]
    fn test_move_log_into_successes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2026-01-01_00-00-00.log");
        fs::write(&path, "line\n").unwrap();

        let dest = move_log(&path, &dir.path().join("successes")).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "line\n");
        assert_eq!(dest.file_name().unwrap(), "2026-01-01_00-00-00.log");
    }
}
