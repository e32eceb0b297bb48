use crate::diff::AttemptDiff;
use crate::errors::StageKind;
use crate::status::Status;
use crate::target::{ArtifactKind, Target};
use crate::ui::icons::{CHECK, CROSS, FILE_DEL, FILE_MOD, FILE_NEW, HAMMER, SKULL, SPARKLE, TEST};
use crate::util::format_elapsed;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Terminal UI for a pocer batch, rendered via `indicatif` progress bars.
///
/// Three bars are stacked vertically:
/// - Target bar: how many targets have finished
/// - Attempt bar: spinner with the current attempt, stage and live status
/// - Artifact bar: what the last regeneration changed
pub struct OrchestratorUI {
    multi: MultiProgress,
    target_bar: ProgressBar,
    attempt_bar: ProgressBar,
    artifact_bar: ProgressBar,
    verbose: bool,
    current_attempt: AtomicU32,
    max_attempts: AtomicU32,
    stage: Mutex<&'static str>,
}

impl OrchestratorUI {
    /// Create the UI and add all three progress bars to the multiplex renderer.
    ///
    /// # Arguments
    /// * `total_targets` - number of targets in the batch, sizes the target bar
    /// * `verbose` - when `true`, per-step output, model snippets and full
    ///   diffs are printed
    pub fn new(total_targets: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let target_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let target_bar = multi.add(ProgressBar::new(total_targets));
        target_bar.set_style(target_style);
        target_bar.set_prefix("Targets");

        let attempt_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let attempt_bar = multi.add(ProgressBar::new_spinner());
        attempt_bar.set_style(attempt_style);
        attempt_bar.set_prefix("Attempt");

        let artifact_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {msg}")
            .expect("progress bar template is a valid static string");

        let artifact_bar = multi.add(ProgressBar::new(0));
        artifact_bar.set_style(artifact_style);
        artifact_bar.set_prefix("  Files");

        Self {
            multi,
            target_bar,
            attempt_bar,
            artifact_bar,
            verbose,
            current_attempt: AtomicU32::new(0),
            max_attempts: AtomicU32::new(0),
            stage: Mutex::new(""),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn stage_label(&self) -> &'static str {
        self.stage.lock().map(|s| *s).unwrap_or("")
    }

    fn set_attempt_message(&self, detail: impl std::fmt::Display) {
        let attempt = self.current_attempt.load(Ordering::SeqCst);
        let max = self.max_attempts.load(Ordering::SeqCst);
        self.attempt_bar.set_message(format!(
            "{}/{} {} {}",
            style(attempt).cyan(),
            max,
            style(self.stage_label()).yellow(),
            detail
        ));
    }

    /// Print the header block for a target and show it on the target bar.
    pub fn start_target(&self, target: &Target, max_attempts: u32) {
        self.target_bar
            .set_message(format!("{}", style(target).yellow()));
        self.artifact_bar.set_message("");
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Target {} ({} attempts max)",
            style("▶").green().bold(),
            style(target).yellow().bold(),
            max_attempts
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    /// Record attempt counters and start the spinner animation.
    pub fn start_attempt(&self, attempt: u32, max: u32) {
        self.current_attempt.store(attempt, Ordering::SeqCst);
        self.max_attempts.store(max, Ordering::SeqCst);
        if let Ok(mut stage) = self.stage.lock() {
            *stage = "";
        }
        self.print_line(format!(
            "  {} attempt {}/{}",
            style("●").cyan(),
            style(attempt).cyan().bold(),
            max
        ));
        self.set_attempt_message(style("(starting...)").dim());
        self.attempt_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    /// Mark `stage` as the one currently running.
    pub fn start_stage(&self, stage: StageKind) {
        if let Ok(mut current) = self.stage.lock() {
            *current = stage.role();
        }
        let icon = match stage {
            StageKind::Build => &HAMMER,
            StageKind::Exploit => &SKULL,
            StageKind::Test => &TEST,
        };
        self.print_line(format!("    {}{}...", icon, style(stage.role()).bold()));
        self.set_attempt_message(style("(running)").dim());
    }

    pub fn stage_finished(&self, stage: StageKind, elapsed: Duration) {
        self.print_line(format!(
            "    {} {} done in {}",
            style("✓").green(),
            stage.role(),
            style(format_elapsed(elapsed)).dim()
        ));
    }

    /// Update the spinner with a short status string; printed in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.set_attempt_message(style(format!("({})", msg)).dim());
        if self.verbose {
            self.print_line(format!("      {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Refresh the spinner with wall-clock time spent in the current stage.
    pub fn update_elapsed(&self, elapsed: Duration) {
        self.set_attempt_message(style(format!("({})", format_elapsed(elapsed))).dim());
    }

    /// Show a tool use event from the model.
    pub fn show_tool_use(&self, emoji: &str, description: &str) {
        self.set_attempt_message(format!("{} {}", emoji, style(description).yellow()));
        self.print_line(format!("      {} {}", emoji, style(description).yellow()));
    }

    /// Show a brief snippet of model text.
    pub fn show_thinking(&self, snippet: &str) {
        self.set_attempt_message(style(format!("💭 {}", snippet)).dim());
        if self.verbose {
            self.print_line(format!(
                "      {} {}",
                style("💭").dim(),
                style(snippet).dim()
            ));
        }
    }

    /// Show what a regeneration changed. Full diffs are printed in verbose mode.
    pub fn show_diff(&self, kind: ArtifactKind, diff: &AttemptDiff) {
        let icon = match diff {
            AttemptDiff::Created { .. } => &FILE_NEW,
            _ => &FILE_MOD,
        };
        let summary = diff.summary();
        if summary.is_empty() {
            return;
        }
        self.artifact_bar
            .set_message(format!("{}{} {}", icon, kind, style(&summary).dim()));
        self.print_line(format!("      {}{} {}", icon, kind, style(&summary).dim()));
        if self.verbose && diff.is_change() {
            for line in diff.render().lines() {
                let styled = if line.starts_with('+') {
                    style(line).green()
                } else if line.starts_with('-') {
                    style(line).red()
                } else {
                    style(line).dim()
                };
                self.print_line(format!("        {}", styled));
            }
        }
    }

    /// Show the classified status of the attempt that just finished.
    pub fn show_status(&self, attempt: u32, status: Status, feedback: &str) {
        let tag = match status {
            Status::Success => style(status.tag()).green().bold(),
            Status::Unknown => style(status.tag()).red().bold(),
            Status::BuildError | Status::ExploitFailure => style(status.tag()).yellow().bold(),
        };
        self.attempt_bar
            .finish_with_message(format!("Attempt {} → {}", attempt, tag));
        self.print_line(format!("    {} status: {}", style("◆").dim(), tag));
        if !feedback.is_empty() {
            self.print_line(format!("      {}", style(feedback).dim()));
        }
    }

    /// Finish the attempt spinner with an infrastructure error.
    pub fn attempt_error(&self, attempt: u32, msg: &str) {
        self.attempt_bar
            .finish_with_message(format!("{}Attempt {} failed: {}", CROSS, attempt, msg));
    }

    pub fn target_succeeded(&self, target: &Target, attempts: u32) {
        self.target_bar.inc(1);
        self.print_line(format!(
            "\n{}{} exploited on attempt {}\n",
            SPARKLE,
            style(target).green().bold(),
            attempts
        ));
    }

    pub fn target_exhausted(&self, target: &Target, attempts: u32, removed: &[PathBuf]) {
        self.target_bar.inc(1);
        self.print_line(format!(
            "\n{}{} not exploited after {} attempts",
            CROSS,
            style(target).red().bold(),
            attempts
        ));
        for path in removed {
            self.print_line(format!("    {}{}", FILE_DEL, style(path.display()).red()));
        }
        self.print_line("");
    }

    pub fn target_aborted(&self, target: &Target, reason: &str) {
        self.target_bar.inc(1);
        self.print_line(format!(
            "\n{}{} aborted: {}\n",
            CROSS,
            style(target).red().bold(),
            reason
        ));
    }

    /// Clear the live bars once the batch is over.
    pub fn finish(&self) {
        self.attempt_bar.finish_and_clear();
        self.artifact_bar.finish_and_clear();
        self.target_bar.finish();
    }

    /// Print the two-column succeeded / failed summary.
    pub fn print_summary(&self, succeeded: &[Target], failed: &[Target]) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{:<35}{}",
            style("Succeeded").green().bold(),
            style("Failed").red().bold()
        ));
        self.print_line(format!("{}", style("─".repeat(70)).dim()));
        let rows = succeeded.len().max(failed.len());
        for i in 0..rows {
            let left = succeeded.get(i).map(|t| t.to_string()).unwrap_or_default();
            let right = failed.get(i).map(|t| t.to_string()).unwrap_or_default();
            self.print_line(format!("{:<35}{}", left, right));
        }
        if rows == 0 {
            self.print_line(format!("{}", style("(no targets)").dim()));
        }
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{}{} succeeded, {} failed",
            if failed.is_empty() { &CHECK } else { &CROSS },
            style(succeeded.len()).green(),
            style(failed.len()).red()
        ));
    }
}
