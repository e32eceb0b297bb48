//! Typed error hierarchy for the pocer pipeline.
//!
//! Three enums cover the three seams:
//! - `StageError`: infrastructure failures raised by a stage collaborator
//! - `ArtifactError`: artifact store I/O
//! - `OrchestratorError`: what a single target run can end with besides
//!   `Success` or `Exhausted`

use crate::status::InvalidStatusTag;
use crate::target::{ArtifactKind, Target};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The three stage roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Build,
    Exploit,
    Test,
}

impl StageKind {
    /// Role name used in logs, prompts and conversation ids.
    pub fn role(&self) -> &'static str {
        match self {
            StageKind::Build => "builder",
            StageKind::Exploit => "hacker",
            StageKind::Test => "tester",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role())
    }
}

/// Infrastructure failures inside a stage collaborator.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Required tool '{tool}' could not be started: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with non-zero code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Model output could not be parsed after {attempts} attempts: {reason}")]
    MalformedOutput { attempts: u32, reason: String },

    #[error("forge could not find tests to run for {target}")]
    NoTestsToRun { target: String },

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatusTag),

    #[error("Source contract not found at {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Static analysis output is invalid: {0}")]
    Analysis(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Artifact store failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read {kind} artifact at {path}: {source}")]
    Read {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {kind} artifact at {path}: {source}")]
    Write {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {kind} artifact at {path}: {source}")]
    Delete {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} artifact at {path} is not valid UTF-8")]
    Encoding { kind: ArtifactKind, path: PathBuf },

    #[error("{kind} artifact for {target} not found in memory or on disk")]
    Missing { kind: ArtifactKind, target: Target },
}

/// Non-success endings of a target run other than exhaustion.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Attempt budget must be at least 1")]
    InvalidBudget,

    #[error("Tester could not attribute the failure of {target} on attempt {attempt}: {feedback}")]
    UnknownStatus {
        target: Target,
        attempt: u32,
        feedback: String,
    },

    #[error("Tester classified failed execution of {target} as success on attempt {attempt}")]
    ContradictoryClassification { target: Target, attempt: u32 },

    #[error("{stage} stage failed for {target} on attempt {attempt}: {source}")]
    Stage {
        stage: StageKind,
        target: Target,
        attempt: u32,
        #[source]
        source: StageError,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl OrchestratorError {
    /// True when the classifier, not the infrastructure, ended the run.
    pub fn is_unattributable(&self) -> bool {
        matches!(self, OrchestratorError::UnknownStatus { .. })
    }
}
