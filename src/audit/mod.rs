//! JSON audit trail of a batch run: every target, every attempt, every
//! regeneration diff and classified status.

mod logger;

pub use logger::AuditLogger;

use crate::diff::AttemptDiff;
use crate::errors::StageKind;
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub config: RunConfig,
    pub targets: Vec<TargetAudit>,
}

impl AuditRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            config,
            targets: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| matches!(t.outcome, TargetOutcome::Succeeded { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_attempts: u32,
    pub fail_fast: bool,
    pub skip_permissions: bool,
    pub verbose: bool,
    pub project_dir: PathBuf,
    pub claude_cmd: String,
    pub forge_cmd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAudit {
    pub target: String,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub attempts: Vec<AttemptAudit>,
    pub outcome: TargetOutcome,
}

impl TargetAudit {
    pub fn new(target: &str, session_id: Uuid) -> Self {
        Self {
            target: target.to_string(),
            session_id,
            started_at: Utc::now(),
            ended_at: None,
            attempts: Vec::new(),
            outcome: TargetOutcome::InProgress,
        }
    }

    pub fn finish(&mut self, outcome: TargetOutcome) {
        self.ended_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TargetOutcome {
    InProgress,
    Succeeded {
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        #[serde(default)]
        removed_artifacts: Vec<PathBuf>,
    },
    Aborted {
        attempt: u32,
        reason: String,
    },
}

/// One attempt cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptAudit {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageRun>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_diff: Option<AttemptDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploit_diff: Option<AttemptDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptAudit {
    pub fn new(attempt: u32) -> Self {
        Self {
            attempt,
            started_at: Utc::now(),
            stages: Vec::new(),
            test_diff: None,
            exploit_diff: None,
            status: None,
            feedback: None,
            error: None,
        }
    }

    pub fn invoked(&self, stage: StageKind) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRun {
    pub stage: StageKind,
    pub duration_secs: f64,
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run_config() -> RunConfig {
        RunConfig {
            max_attempts: 7,
            fail_fast: false,
            skip_permissions: true,
            verbose: false,
            project_dir: PathBuf::from("."),
            claude_cmd: "claude".to_string(),
            forge_cmd: "forge".to_string(),
        }
    }

    #[test]
    fn test_attempt_invoked_stages() {
        let mut attempt = AttemptAudit::new(2);
        attempt.stages.push(StageRun {
            stage: StageKind::Exploit,
            duration_secs: 1.0,
            ok: true,
        });
        assert!(attempt.invoked(StageKind::Exploit));
        assert!(!attempt.invoked(StageKind::Build));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(TargetOutcome::Aborted {
            attempt: 1,
            reason: "unknown".to_string(),
        })
        .unwrap();
        assert_eq!(json["result"], "aborted");
        assert_eq!(json["attempt"], 1);
    }

    #[test]
    fn test_run_counts_successes() {
        let mut run = AuditRun::new(make_run_config());
        let mut a = TargetAudit::new("A.sol", Uuid::new_v4());
        a.finish(TargetOutcome::Succeeded { attempts: 2 });
        let mut b = TargetAudit::new("B.sol", Uuid::new_v4());
        b.finish(TargetOutcome::Exhausted {
            attempts: 7,
            removed_artifacts: vec![],
        });
        run.targets.push(a);
        run.targets.push(b);
        assert_eq!(run.succeeded(), 1);
        assert!(run.ended_at.is_none());
        run.finish();
        assert!(run.ended_at.is_some());
    }
}
