use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// One line of `.pocer/state`: `target|attempt|status|timestamp`.
///
/// `status` is a classified status tag for finished cycles, or `exhausted` /
/// `aborted` for the line closing a target's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub target: String,
    pub attempt: u32,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub struct StateManager {
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn save(&self, target: &str, attempt: u32, status: &str) -> Result<()> {
        let entry = format!(
            "{}|{}|{}|{}\n",
            target,
            attempt,
            status,
            Utc::now().to_rfc3339()
        );

        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .context("Failed to open state file")?
            .write_all(entry.as_bytes())
            .context("Failed to write state entry")?;

        Ok(())
    }

    pub fn get_entries(&self) -> Result<Vec<StateEntry>> {
        if !self.state_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.state_file).context("Failed to read state file")?;

        let entries = content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                if parts.len() != 4 {
                    return None;
                }
                Some(StateEntry {
                    target: parts[0].to_string(),
                    attempt: parts[1].parse().unwrap_or(0),
                    status: parts[2].to_string(),
                    timestamp: DateTime::parse_from_rfc3339(parts[3])
                        .ok()?
                        .with_timezone(&Utc),
                })
            })
            .collect();

        Ok(entries)
    }

    /// Most recent entry per target, ordered by target name.
    pub fn latest_by_target(&self) -> Result<BTreeMap<String, StateEntry>> {
        let mut latest = BTreeMap::new();
        for entry in self.get_entries()? {
            latest.insert(entry.target.clone(), entry);
        }
        Ok(latest)
    }

    pub fn reset(&self) -> Result<()> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).context("Failed to remove state file")?;
        }
        Ok(())
    }
}
