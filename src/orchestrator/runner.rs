use super::StateManager;
use crate::artifact::ArtifactStore;
use crate::audit::{AttemptAudit, AuditLogger, StageRun, TargetAudit, TargetOutcome};
use crate::diff::{self, AttemptDiff};
use crate::errors::{OrchestratorError, StageError, StageKind};
use crate::session::Session;
use crate::stage::{BuildStage, ExploitStage, FailureContext, TestStage};
use crate::status::Status;
use crate::target::{ArtifactKind, Target};
use crate::ui::OrchestratorUI;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// Terminal disposition of a target that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Exhausted,
}

/// Result of [`Orchestrator::run_target`].
#[derive(Debug, Clone)]
pub struct TargetRun {
    pub disposition: Disposition,
    pub attempts_used: u32,
    pub trace: Vec<AttemptAudit>,
}

/// A target whose run ended with an error instead of a disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedTarget {
    pub target: Target,
    pub reason: String,
}

/// Aggregate result of [`Orchestrator::run_batch`]. Both lists keep the
/// order in which targets were processed; aborted targets are also listed
/// in `failed_targets`.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub succeeded_targets: Vec<Target>,
    pub failed_targets: Vec<Target>,
    pub aborted: Vec<AbortedTarget>,
    /// Set when `fail_fast` stopped the batch before every target ran.
    pub stopped_early: bool,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failed_targets.is_empty() && !self.stopped_early
    }
}

/// State carried from one attempt cycle to the next for a single target.
/// A fresh context is created for every target.
#[derive(Debug, Default)]
struct AttemptContext {
    attempt_number: u32,
    last_status: Option<Status>,
    failure: Option<FailureContext>,
}

impl AttemptContext {
    fn should_build(&self) -> bool {
        self.attempt_number == 1 || self.last_status == Some(Status::BuildError)
    }

    fn should_exploit(&self) -> bool {
        self.attempt_number == 1 || self.last_status == Some(Status::ExploitFailure)
    }
}

enum CycleOutcome {
    Success,
    Retry(Status, FailureContext),
}

/// Pre-regeneration content of an artifact.
enum Snapshot {
    Absent,
    Content(String),
    Unreadable,
}

/// Drives targets through build / exploit / test attempt cycles.
///
/// After the first cycle only the stage blamed by the previous classification
/// is regenerated. The test stage runs exactly once per cycle. Targets are
/// processed one at a time.
pub struct Orchestrator<B, E, T> {
    build: B,
    exploit: E,
    test: T,
    store: Arc<ArtifactStore>,
    ui: Option<Arc<OrchestratorUI>>,
    state: Option<StateManager>,
    audit: Option<Mutex<AuditLogger>>,
}

impl<B, E, T> Orchestrator<B, E, T>
where
    B: BuildStage,
    E: ExploitStage,
    T: TestStage,
{
    pub fn new(build: B, exploit: E, test: T, store: Arc<ArtifactStore>) -> Self {
        Self {
            build,
            exploit,
            test,
            store,
            ui: None,
            state: None,
            audit: None,
        }
    }

    pub fn with_ui(mut self, ui: Option<Arc<OrchestratorUI>>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    /// Audit records are appended to the logger's active run.
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Give back the audit logger so the caller can finish the run.
    pub fn into_audit(self) -> Option<AuditLogger> {
        self.audit.and_then(|a| a.into_inner().ok())
    }

    /// Run attempt cycles for `target` until success or `max_attempts` is used.
    ///
    /// Returns `Err` when the tester cannot attribute a failure (`Unknown`),
    /// contradicts the execution result, or a stage fails for infrastructure
    /// reasons. Artifacts are never deleted here.
    pub async fn run_target(
        &self,
        target: &Target,
        max_attempts: u32,
    ) -> Result<TargetRun, OrchestratorError> {
        if max_attempts == 0 {
            return Err(OrchestratorError::InvalidBudget);
        }

        let session = Session::new();
        info!(target = %target, session = %session.id(), max_attempts, "starting target");
        self.audit_update(|logger| {
            logger.add_target(TargetAudit::new(target.file_name(), session.id()))
        });
        if let Some(ref ui) = self.ui {
            ui.start_target(target, max_attempts);
        }

        let mut ctx = AttemptContext::default();
        let mut trace = Vec::new();

        for attempt in 1..=max_attempts {
            ctx.attempt_number = attempt;
            info!(target = %target, attempt, "starting attempt");
            if let Some(ref ui) = self.ui {
                ui.start_attempt(attempt, max_attempts);
            }

            let mut record = AttemptAudit::new(attempt);
            let cycle = self.run_cycle(target, &session, &ctx, &mut record).await;
            if let Err(ref e) = cycle {
                record.error = Some(e.to_string());
            }
            self.record_attempt(target, &record);
            trace.push(record);

            match cycle {
                Ok(CycleOutcome::Success) => {
                    info!(target = %target, attempt, "exploit succeeded");
                    self.audit_update(|logger| {
                        logger.update_last_target(|t| {
                            t.finish(TargetOutcome::Succeeded { attempts: attempt })
                        })
                    });
                    return Ok(TargetRun {
                        disposition: Disposition::Success,
                        attempts_used: attempt,
                        trace,
                    });
                }
                Ok(CycleOutcome::Retry(status, failure)) => {
                    ctx.last_status = Some(status);
                    ctx.failure = Some(failure);
                }
                Err(e) => {
                    error!(target = %target, attempt, error = %e, "target aborted");
                    if let Some(ref ui) = self.ui {
                        ui.attempt_error(attempt, &e.to_string());
                    }
                    self.save_state(target, attempt, "aborted");
                    let reason = e.to_string();
                    self.audit_update(|logger| {
                        logger.update_last_target(|t| {
                            t.finish(TargetOutcome::Aborted { attempt, reason })
                        })
                    });
                    return Err(e);
                }
            }
        }

        info!(target = %target, max_attempts, "attempt budget exhausted");
        self.save_state(target, max_attempts, "exhausted");
        self.audit_update(|logger| {
            logger.update_last_target(|t| {
                t.finish(TargetOutcome::Exhausted {
                    attempts: max_attempts,
                    removed_artifacts: Vec::new(),
                })
            })
        });
        Ok(TargetRun {
            disposition: Disposition::Exhausted,
            attempts_used: max_attempts,
            trace,
        })
    }

    /// Run every target in order. Exhausted targets have their artifacts
    /// deleted. Aborted targets are recorded as failed and the batch moves on,
    /// unless `fail_fast` is set.
    pub async fn run_batch(
        &self,
        targets: &[Target],
        max_attempts: u32,
        fail_fast: bool,
    ) -> Result<BatchOutcome, OrchestratorError> {
        if max_attempts == 0 {
            return Err(OrchestratorError::InvalidBudget);
        }

        let mut outcome = BatchOutcome::default();

        for target in targets {
            match self.run_target(target, max_attempts).await {
                Ok(run) if run.disposition == Disposition::Success => {
                    if let Some(ref ui) = self.ui {
                        ui.target_succeeded(target, run.attempts_used);
                    }
                    outcome.succeeded_targets.push(target.clone());
                }
                Ok(run) => {
                    let removed = self.discard_artifacts(target);
                    if let Some(ref ui) = self.ui {
                        ui.target_exhausted(target, run.attempts_used, &removed);
                    }
                    self.audit_update(|logger| {
                        logger.update_last_target(|t| {
                            if let TargetOutcome::Exhausted {
                                ref mut removed_artifacts,
                                ..
                            } = t.outcome
                            {
                                *removed_artifacts = removed.clone();
                            }
                        })
                    });
                    outcome.failed_targets.push(target.clone());
                }
                Err(e) => {
                    if let Some(ref ui) = self.ui {
                        ui.target_aborted(target, &e.to_string());
                    }
                    outcome.failed_targets.push(target.clone());
                    outcome.aborted.push(AbortedTarget {
                        target: target.clone(),
                        reason: e.to_string(),
                    });
                    if fail_fast {
                        warn!(target = %target, "fail-fast set, stopping batch");
                        outcome.stopped_early = true;
                        break;
                    }
                }
            }
        }

        info!(
            succeeded = outcome.succeeded_targets.len(),
            failed = outcome.failed_targets.len(),
            "batch finished"
        );
        Ok(outcome)
    }

    async fn run_cycle(
        &self,
        target: &Target,
        session: &Session,
        ctx: &AttemptContext,
        record: &mut AttemptAudit,
    ) -> Result<CycleOutcome, OrchestratorError> {
        let attempt = ctx.attempt_number;
        let prior = ctx.failure.as_ref();

        if ctx.should_build() {
            let before = self.snapshot(target, ArtifactKind::Test);
            self.timed(
                StageKind::Build,
                target,
                attempt,
                record,
                self.build.attempt(target, session, prior),
            )
            .await?;
            record.test_diff = Some(self.diff_after(target, ArtifactKind::Test, before)?);
        }

        if ctx.should_exploit() {
            let test_code = self.store.require(target, ArtifactKind::Test)?;
            let before = self.snapshot(target, ArtifactKind::Exploit);
            self.timed(
                StageKind::Exploit,
                target,
                attempt,
                record,
                self.exploit.attempt(target, session, &test_code, prior),
            )
            .await?;
            record.exploit_diff = Some(self.diff_after(target, ArtifactKind::Exploit, before)?);
        }

        let result = self
            .timed(StageKind::Test, target, attempt, record, self.test.run(target))
            .await?;

        if result.succeeded {
            record.status = Some(Status::Success);
            if let Some(ref ui) = self.ui {
                ui.show_status(attempt, Status::Success, "");
            }
            return Ok(CycleOutcome::Success);
        }

        let classification = self
            .timed(
                StageKind::Test,
                target,
                attempt,
                record,
                self.test.classify(target, session, &result),
            )
            .await?;

        record.status = Some(classification.status);
        record.feedback = Some(classification.feedback.clone());
        info!(
            target = %target,
            attempt,
            status = %classification.status,
            feedback = %classification.feedback,
            "attempt classified"
        );
        if let Some(ref ui) = self.ui {
            ui.show_status(attempt, classification.status, &classification.feedback);
        }

        match classification.status {
            Status::Success => Err(OrchestratorError::ContradictoryClassification {
                target: target.clone(),
                attempt,
            }),
            Status::Unknown => Err(OrchestratorError::UnknownStatus {
                target: target.clone(),
                attempt,
                feedback: classification.feedback,
            }),
            status @ (Status::BuildError | Status::ExploitFailure) => Ok(CycleOutcome::Retry(
                status,
                FailureContext {
                    output: result.output_text,
                    classification,
                },
            )),
        }
    }

    /// Await one stage call, recording its duration and mapping its error.
    async fn timed<R, F>(
        &self,
        stage: StageKind,
        target: &Target,
        attempt: u32,
        record: &mut AttemptAudit,
        call: F,
    ) -> Result<R, OrchestratorError>
    where
        F: Future<Output = Result<R, StageError>>,
    {
        if let Some(ref ui) = self.ui {
            ui.start_stage(stage);
        }
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed();

        record.stages.push(StageRun {
            stage,
            duration_secs: elapsed.as_secs_f64(),
            ok: result.is_ok(),
        });
        if let Some(ref ui) = self.ui
            && result.is_ok()
        {
            ui.stage_finished(stage, elapsed);
        }

        result.map_err(|source| OrchestratorError::Stage {
            stage,
            target: target.clone(),
            attempt,
            source,
        })
    }

    fn snapshot(&self, target: &Target, kind: ArtifactKind) -> Snapshot {
        match self.store.read_snapshot(target, kind) {
            Ok(Some(content)) => Snapshot::Content(content),
            Ok(None) => Snapshot::Absent,
            Err(e) => {
                warn!(target = %target, kind = %kind, error = %e, "could not snapshot artifact before regeneration");
                Snapshot::Unreadable
            }
        }
    }

    /// Diff the regenerated artifact against its snapshot. Only a missing
    /// artifact is an error; unreadable content yields an unavailable diff.
    fn diff_after(
        &self,
        target: &Target,
        kind: ArtifactKind,
        before: Snapshot,
    ) -> Result<AttemptDiff, OrchestratorError> {
        let label = match kind {
            ArtifactKind::Test => "Test File",
            ArtifactKind::Exploit => "Exploit File",
        };

        let current = match self.store.get(target, kind) {
            Ok(Some(content)) => content,
            Ok(None) => {
                return Err(crate::errors::ArtifactError::Missing {
                    kind,
                    target: target.clone(),
                }
                .into());
            }
            Err(e) => {
                warn!(target = %target, kind = %kind, error = %e, "could not read regenerated artifact");
                return Ok(AttemptDiff::Unavailable);
            }
        };

        let result = match before {
            Snapshot::Absent => diff::diff(None, &current, label),
            Snapshot::Content(old) => diff::diff(Some(&old), &current, label),
            Snapshot::Unreadable => AttemptDiff::Unavailable,
        };

        if result.is_change() {
            info!(target = %target, kind = %kind, "{} differences:\n{}", label, result.render());
        } else {
            info!(target = %target, kind = %kind, summary = %result.summary(), "{} regenerated", label);
        }
        if let Some(ref ui) = self.ui {
            ui.show_diff(kind, &result);
        }
        Ok(result)
    }

    fn discard_artifacts(&self, target: &Target) -> Vec<PathBuf> {
        match self.store.delete_all(target) {
            Ok(removed) => {
                for path in &removed {
                    info!(target = %target, path = %path.display(), "deleted artifact");
                }
                removed
            }
            Err(e) => {
                error!(target = %target, error = %e, "failed to delete artifacts");
                Vec::new()
            }
        }
    }

    fn record_attempt(&self, target: &Target, record: &AttemptAudit) {
        if let Some(status) = record.status {
            self.save_state(target, record.attempt, status.tag());
        }
        self.audit_update(|logger| {
            logger.update_last_target(|t| t.attempts.push(record.clone()))
        });
    }

    fn save_state(&self, target: &Target, attempt: u32, status: &str) {
        if let Some(ref state) = self.state
            && let Err(e) = state.save(target.file_name(), attempt, status)
        {
            warn!(error = %e, "failed to save state entry");
        }
    }

    fn audit_update<F>(&self, f: F)
    where
        F: FnOnce(&mut AuditLogger) -> anyhow::Result<()>,
    {
        let Some(ref audit) = self.audit else {
            return;
        };
        match audit.lock() {
            Ok(mut logger) => {
                if let Err(e) = f(&mut logger) {
                    warn!(error = %e, "failed to update audit log");
                }
            }
            Err(_) => warn!("audit logger lock poisoned"),
        }
    }
}
