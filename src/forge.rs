//! Foundry `forge test` invocation.

use crate::errors::StageError;
use crate::status::ExecutionResult;
use crate::target::Target;
use crate::util::tail_chars;
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

const NO_TESTS_MARKER: &str = "No tests to run";

pub struct ForgeRunner {
    forge_cmd: String,
    project_dir: PathBuf,
    output_limit: usize,
}

impl ForgeRunner {
    pub fn new(forge_cmd: impl Into<String>, project_dir: PathBuf, output_limit: usize) -> Self {
        Self {
            forge_cmd: forge_cmd.into(),
            project_dir,
            output_limit,
        }
    }

    /// Run `forge test -vvv --match-contract <Stem>` in the project root.
    ///
    /// The combined stdout and stderr is cut to the last `output_limit`
    /// characters. Exit code 0 is success. Output reporting that no tests
    /// matched is an infrastructure failure, not a test failure.
    pub async fn test(&self, target: &Target) -> Result<ExecutionResult, StageError> {
        let args = ["test", "-vvv", "--match-contract", target.stem()];
        info!(command = %format!("{} {}", self.forge_cmd, args.join(" ")), "running forge");

        let start = Instant::now();
        let output = Command::new(&self.forge_cmd)
            .args(args)
            .current_dir(&self.project_dir)
            .output()
            .await
            .map_err(|source| StageError::ToolNotFound {
                tool: self.forge_cmd.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let output_text = tail_chars(&combined, self.output_limit).to_string();

        debug!(
            exit_code = output.status.code().unwrap_or(-1),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "forge finished"
        );

        if output_text.contains(NO_TESTS_MARKER) {
            return Err(StageError::NoTestsToRun {
                target: target.to_string(),
            });
        }

        Ok(ExecutionResult::new(output_text, output.status.success()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_forge_is_tool_not_found() {
        let dir = tempdir().unwrap();
        let runner = ForgeRunner::new("/nonexistent/forge", dir.path().to_path_buf(), 4000);
        let err = runner.test(&Target::new("Vault")).await.unwrap_err();
        assert!(matches!(err, StageError::ToolNotFound { ref tool, .. } if tool == "/nonexistent/forge"));
    }

    #[cfg(unix)]
    mod with_fake_forge {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        fn fake_forge(dir: &std::path::Path, script: &str) -> String {
            let path = dir.join("fake-forge.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().to_string()
        }

        #[tokio::test]
        async fn test_exit_zero_is_success() {
            let dir = tempdir().unwrap();
            let forge = fake_forge(dir.path(), "echo \"[PASS] testHack() $4\"");
            let runner = ForgeRunner::new(forge, dir.path().to_path_buf(), 4000);
            let result = runner.test(&Target::new("Vault.sol")).await.unwrap();
            assert!(result.succeeded);
            assert!(result.output_text.contains("[PASS] testHack() Vault"));
        }

        #[tokio::test]
        async fn test_failure_output_is_truncated_from_the_end() {
            let dir = tempdir().unwrap();
            let forge = fake_forge(dir.path(), "echo 0123456789; echo tail-marker >&2; exit 1");
            let runner = ForgeRunner::new(forge, dir.path().to_path_buf(), 12);
            let result = runner.test(&Target::new("Vault")).await.unwrap();
            assert!(!result.succeeded);
            assert_eq!(result.output_text.chars().count(), 12);
            assert!(result.output_text.ends_with("tail-marker\n"));
        }

        #[tokio::test]
        async fn test_no_tests_is_infrastructure_failure() {
            let dir = tempdir().unwrap();
            let forge = fake_forge(dir.path(), "echo 'No tests to run'; exit 1");
            let runner = ForgeRunner::new(forge, dir.path().to_path_buf(), 4000);
            let err = runner.test(&Target::new("Ghost")).await.unwrap_err();
            assert!(matches!(err, StageError::NoTestsToRun { .. }));
        }
    }
}
