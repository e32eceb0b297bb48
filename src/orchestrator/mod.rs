//! The attempt loop: per-target retry cycles and the batch driver.

pub mod runner;
pub mod state;

pub use runner::{AbortedTarget, BatchOutcome, Disposition, Orchestrator, TargetRun};
pub use state::StateManager;
