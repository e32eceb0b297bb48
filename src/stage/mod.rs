//! Stage collaborators driven by the orchestrator.
//!
//! Each role sits behind an async trait so the orchestrator can be exercised
//! with scripted stages in tests and with Claude/forge backed stages in
//! production:
//!
//! - [`BuildStage`] writes the target's test harness
//! - [`ExploitStage`] writes the target's exploit contract
//! - [`TestStage`] executes the harness and classifies failures
//!
//! Stages report infrastructure failures as [`StageError`]; contract-level
//! failures only ever surface through [`TestStage::classify`].

pub mod builder;
pub mod claude;
pub mod context;
pub mod hacker;
pub mod tester;

use crate::errors::StageError;
use crate::session::Session;
use crate::status::{Classification, ExecutionResult};
use crate::target::Target;
use async_trait::async_trait;

pub use builder::ClaudeBuilder;
pub use claude::ClaudeRunner;
pub use context::SourceContext;
pub use hacker::ClaudeHacker;
pub use tester::ForgeTester;

/// What the previous cycle learned, handed to the stage being regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    /// Raw (truncated) test execution output.
    pub output: String,
    pub classification: Classification,
}

#[async_trait]
pub trait BuildStage: Send + Sync {
    /// Generate (or regenerate) the test harness for `target` and store it.
    async fn attempt(
        &self,
        target: &Target,
        session: &Session,
        prior: Option<&FailureContext>,
    ) -> Result<(), StageError>;
}

#[async_trait]
pub trait ExploitStage: Send + Sync {
    /// Generate (or regenerate) the exploit for `target` against `test_code`.
    async fn attempt(
        &self,
        target: &Target,
        session: &Session,
        test_code: &str,
        prior: Option<&FailureContext>,
    ) -> Result<(), StageError>;
}

#[async_trait]
pub trait TestStage: Send + Sync {
    /// Execute the current harness and exploit.
    async fn run(&self, target: &Target) -> Result<ExecutionResult, StageError>;

    /// Attribute a failed execution to one of the stages.
    async fn classify(
        &self,
        target: &Target,
        session: &Session,
        result: &ExecutionResult,
    ) -> Result<Classification, StageError>;
}
