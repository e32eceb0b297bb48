//! Integration tests for pocer
//!
//! These drive the compiled binary against temporary Foundry-style project
//! layouts. Model and forge invocations are replaced by small shell scripts.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a pocer Command
fn pocer() -> Command {
    cargo_bin_cmd!("pocer")
}

/// Helper to create a project with the given contracts under `src/`
fn create_project(contracts: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    for name in contracts {
        fs::write(
            dir.path().join("src").join(name),
            format!("contract {} {{}}\n", name.trim_end_matches(".sol")),
        )
        .unwrap();
    }
    dir
}

fn write_config(dir: &Path, content: &str) {
    fs::create_dir_all(dir.join(".pocer")).unwrap();
    fs::write(dir.join(".pocer/pocer.toml"), content).unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_pocer_help() {
        pocer()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("status"));
    }

    #[test]
    fn test_pocer_version() {
        pocer().arg("--version").assert().success();
    }

    #[test]
    fn test_run_help_lists_flags() {
        pocer()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--file"))
            .stdout(predicate::str::contains("--attempts"))
            .stdout(predicate::str::contains("--fail-fast"));
    }
}

// =============================================================================
// Target Listing
// =============================================================================

mod targets {
    use super::*;

    #[test]
    fn test_list_shows_sorted_targets() {
        let dir = create_project(&["Vault.sol", "Dex.sol"]);

        let output = pocer()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("2 target(s)"))
            .get_output()
            .stdout
            .clone();

        let text = String::from_utf8(output).unwrap();
        let dex = text.find("Dex.sol").unwrap();
        let vault = text.find("Vault.sol").unwrap();
        assert!(dex < vault);
        assert!(text.contains("DexTest.sol"));
        assert!(text.contains("VaultExploit.sol"));
    }

    #[test]
    fn test_list_without_contracts() {
        let dir = create_project(&[]);
        pocer()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No targets found"));
    }

    #[test]
    fn test_list_with_project_dir_flag() {
        let dir = create_project(&["Token.sol"]);
        pocer()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("Token.sol"));
    }
}

// =============================================================================
// Status and Reset
// =============================================================================

mod status {
    use super::*;

    #[test]
    fn test_status_before_any_run() {
        let dir = create_project(&["Vault.sol"]);
        pocer()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not started"));
    }

    #[test]
    fn test_status_reads_latest_entry_per_target() {
        let dir = create_project(&["Vault.sol"]);
        fs::create_dir_all(dir.path().join(".pocer")).unwrap();
        fs::write(
            dir.path().join(".pocer/state"),
            "Vault.sol|1|builder_error|2026-01-01T00:00:00+00:00\n\
             Vault.sol|2|success|2026-01-01T00:05:00+00:00\n",
        )
        .unwrap();

        pocer()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Vault.sol"))
            .stdout(predicate::str::contains("success"))
            .stdout(predicate::str::contains("builder_error").not());
    }

    #[test]
    fn test_reset_force_clears_state() {
        let dir = create_project(&["Vault.sol"]);
        fs::create_dir_all(dir.path().join(".pocer/logs")).unwrap();
        fs::write(
            dir.path().join(".pocer/state"),
            "Vault.sol|1|success|2026-01-01T00:00:00+00:00\n",
        )
        .unwrap();

        pocer()
            .current_dir(dir.path())
            .args(["reset", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Reset complete"));

        assert!(!dir.path().join(".pocer/state").exists());
        assert!(!dir.path().join(".pocer/logs").exists());
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_init_then_show() {
        let dir = create_project(&[]);

        pocer()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created pocer.toml"));
        assert!(dir.path().join(".pocer/pocer.toml").exists());

        pocer()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_attempts = 7"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_project(&[]);
        write_config(dir.path(), "[defaults]\nmax_attempts = 3\n");

        pocer()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".pocer/pocer.toml")).unwrap();
        assert!(content.contains("max_attempts = 3"));
    }

    #[test]
    fn test_config_show_without_file() {
        let dir = create_project(&[]);
        pocer()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("No pocer.toml found"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_project(&[]);
        write_config(dir.path(), "[defaults]\nmax_attempts = 0\n");

        pocer()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_attempts is 0"));
    }

    #[test]
    fn test_config_with_invalid_toml_fails() {
        let dir = create_project(&[]);
        write_config(dir.path(), "[defaults\nmax_attempts = ");

        pocer()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Run Prerequisites
// =============================================================================

mod run_errors {
    use super::*;

    #[test]
    fn test_run_without_contracts_fails() {
        let dir = create_project(&[]);
        pocer()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No .sol files found"));
    }

    #[test]
    fn test_run_with_missing_file_fails() {
        let dir = create_project(&["Vault.sol"]);
        pocer()
            .current_dir(dir.path())
            .args(["run", "-f", "Missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing.sol"));
    }

    #[test]
    fn test_run_with_zero_attempts_fails() {
        let dir = create_project(&["Vault.sol"]);
        pocer()
            .current_dir(dir.path())
            .args(["run", "-n", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Attempt budget"));
    }

    #[test]
    fn test_analysis_failure_moves_log_to_failures() {
        let dir = create_project(&["Vault.sol"]);
        write_config(dir.path(), "[project]\nanalysis_file = \"missing.json\"\n");

        pocer()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Static analysis failed"));

        let logs = dir.path().join(".pocer/logs");
        let failed: Vec<_> = fs::read_dir(logs.join("failures"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].extension().unwrap(), "log");
        let left_behind = fs::read_dir(&logs)
            .unwrap()
            .filter(|entry| entry.as_ref().unwrap().path().is_file())
            .count();
        assert_eq!(left_behind, 0);
    }
}

// =============================================================================
// End-to-end runs with scripted tools
// =============================================================================

#[cfg(unix)]
mod scripted_runs {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    /// A model that answers every role with the same JSON object.
    fn fake_claude(dir: &Path, status: &str) -> String {
        let reply = serde_json::json!({
            "my_test_code": "contract VaultTest {}",
            "my_attempt": "contract VaultExploit {}",
            "my_explanation": "scripted",
            "status": status,
            "feedback": "scripted feedback",
            "suggestions": "none",
        })
        .to_string();
        let event = serde_json::json!({
            "type": "result",
            "subtype": "success",
            "result": reply,
            "is_error": false,
        });
        write_script(
            dir,
            "fake-claude.sh",
            &format!("cat > /dev/null\nprintf '%s\\n' '{}'", event),
        )
    }

    fn fake_forge(dir: &Path, passes: bool) -> String {
        if passes {
            write_script(dir, "fake-forge.sh", "echo '[PASS] testExploit()'\nexit 0")
        } else {
            write_script(dir, "fake-forge.sh", "echo '[FAIL] testExploit()'\nexit 1")
        }
    }

    fn configure(dir: &Path, claude: &str, forge: &str) {
        write_config(
            dir,
            &format!(
                "[project]\nclaude_cmd = \"{}\"\nforge_cmd = \"{}\"\n",
                claude, forge
            ),
        );
    }

    #[test]
    fn test_run_succeeds_and_keeps_artifacts() {
        let dir = create_project(&["Vault.sol"]);
        let tools = TempDir::new().unwrap();
        configure(
            dir.path(),
            &fake_claude(tools.path(), "success"),
            &fake_forge(tools.path(), true),
        );

        pocer()
            .current_dir(dir.path())
            .args(["run", "-n", "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("successes"));

        assert_eq!(
            fs::read_to_string(dir.path().join("test/VaultTest.sol")).unwrap(),
            "contract VaultTest {}"
        );
        assert!(dir.path().join("exploits/VaultExploit.sol").exists());

        let state = fs::read_to_string(dir.path().join(".pocer/state")).unwrap();
        assert!(state.contains("Vault.sol|1|success|"));
        let runs: Vec<_> = fs::read_dir(dir.path().join(".pocer/audit/runs"))
            .unwrap()
            .collect();
        assert_eq!(runs.len(), 1);

        let successes = dir.path().join(".pocer/logs/successes");
        let turn_dir = fs::read_dir(&successes)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.is_dir())
            .unwrap();
        assert!(turn_dir.join("turn-001-builder-prompt.md").exists());
        assert!(turn_dir.join("turn-001-builder-output.log").exists());
    }

    #[test]
    fn test_run_exhausts_and_deletes_artifacts() {
        let dir = create_project(&["Vault.sol"]);
        let tools = TempDir::new().unwrap();
        configure(
            dir.path(),
            &fake_claude(tools.path(), "hacker_failure"),
            &fake_forge(tools.path(), false),
        );

        pocer()
            .current_dir(dir.path())
            .args(["run", "-n", "2"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("failures"));

        assert!(!dir.path().join("test/VaultTest.sol").exists());
        assert!(!dir.path().join("exploits/VaultExploit.sol").exists());

        let state = fs::read_to_string(dir.path().join(".pocer/state")).unwrap();
        assert!(state.contains("Vault.sol|2|hacker_failure|"));
        assert!(state.contains("Vault.sol|2|exhausted|"));
    }

    #[test]
    fn test_unknown_status_aborts_and_keeps_artifacts() {
        let dir = create_project(&["Vault.sol"]);
        let tools = TempDir::new().unwrap();
        configure(
            dir.path(),
            &fake_claude(tools.path(), "unknown"),
            &fake_forge(tools.path(), false),
        );

        pocer()
            .current_dir(dir.path())
            .args(["run", "-n", "5"])
            .assert()
            .failure();

        assert!(dir.path().join("test/VaultTest.sol").exists());
        let state = fs::read_to_string(dir.path().join(".pocer/state")).unwrap();
        assert!(state.contains("Vault.sol|1|unknown|"));
        assert!(state.contains("Vault.sol|1|aborted|"));
        assert!(!state.contains("|2|"));
    }
}
