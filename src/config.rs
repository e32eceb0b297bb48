use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::pocer_config::{PocerToml, StageSection};

/// Name of the per-project state directory.
pub const POCER_DIR: &str = ".pocer";

/// Runtime configuration for pocer.
///
/// Bridges `PocerToml` with the runtime needs of the pipeline: resolves
/// every directory against the project root and applies CLI overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub pocer_dir: PathBuf,
    pub src_dir: PathBuf,
    pub test_dir: PathBuf,
    pub exploit_dir: PathBuf,
    pub audit_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_file: PathBuf,
    pub claude_cmd: String,
    pub forge_cmd: String,
    pub analyzer_cmd: Option<PathBuf>,
    pub analysis_file: Option<PathBuf>,
    pub skip_permissions: bool,
    pub verbose: bool,
    pub max_attempts: u32,
    pub output_limit: usize,
    pub format_retries: u32,
    pub builder: StageSection,
    pub hacker: StageSection,
    pub tester: StageSection,
    toml: PocerToml,
}

impl Config {
    /// Load `.pocer/pocer.toml` under `project_dir` and apply CLI overrides.
    pub fn new(project_dir: PathBuf, verbose: bool, max_attempts: Option<u32>) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let pocer_dir = project_dir.join(POCER_DIR);
        let toml = PocerToml::load_or_default(&pocer_dir)?;
        Ok(Self::from_toml(project_dir, toml, verbose, max_attempts))
    }

    /// Build from an already-parsed `PocerToml`. `project_dir` is used as-is.
    pub fn from_toml(
        project_dir: PathBuf,
        toml: PocerToml,
        verbose: bool,
        max_attempts: Option<u32>,
    ) -> Self {
        let pocer_dir = project_dir.join(POCER_DIR);
        let resolve = |p: &Path| project_dir.join(p);

        let log_dir = toml
            .project
            .log_dir
            .as_deref()
            .map(resolve)
            .unwrap_or_else(|| pocer_dir.join("logs"));

        let resolve_section = |section: &StageSection| StageSection {
            model: section.model.clone(),
            skeleton: section.skeleton.as_deref().map(resolve),
        };

        Self {
            src_dir: resolve(&toml.project.src_dir),
            test_dir: resolve(&toml.project.test_dir),
            exploit_dir: resolve(&toml.project.exploit_dir),
            audit_dir: pocer_dir.join("audit"),
            state_file: pocer_dir.join("state"),
            log_dir,
            claude_cmd: toml.claude_cmd(),
            forge_cmd: toml.forge_cmd(),
            analyzer_cmd: toml.project.analyzer_cmd.clone(),
            analysis_file: toml.project.analysis_file.as_deref().map(resolve),
            skip_permissions: toml.skip_permissions(),
            verbose,
            max_attempts: max_attempts.unwrap_or(toml.defaults.max_attempts),
            output_limit: toml.defaults.output_limit,
            format_retries: toml.defaults.format_retries,
            builder: resolve_section(&toml.builder),
            hacker: resolve_section(&toml.hacker),
            tester: resolve_section(&toml.tester),
            pocer_dir,
            project_dir,
            toml,
        }
    }

    /// The parsed configuration file this runtime config was built from.
    pub fn pocer_toml(&self) -> &PocerToml {
        &self.toml
    }

    pub fn config_file(&self) -> PathBuf {
        self.pocer_dir.join(crate::pocer_config::CONFIG_FILE_NAME)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.audit_dir).context("Failed to create audit directory")?;
        std::fs::create_dir_all(self.audit_dir.join("runs"))
            .context("Failed to create runs directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        std::fs::create_dir_all(&self.test_dir).context("Failed to create test directory")?;
        std::fs::create_dir_all(&self.exploit_dir)
            .context("Failed to create exploits directory")?;
        Ok(())
    }

    /// Base flags for every Claude CLI invocation.
    pub fn claude_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags.push("--print".to_string());
        flags.push("--output-format".to_string());
        flags.push("stream-json".to_string());
        flags.push("--verbose".to_string());
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults_resolve_under_project() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false, None).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.src_dir, root.join("src"));
        assert_eq!(config.test_dir, root.join("test"));
        assert_eq!(config.exploit_dir, root.join("exploits"));
        assert_eq!(config.audit_dir, root.join(".pocer/audit"));
        assert_eq!(config.log_dir, root.join(".pocer/logs"));
        assert_eq!(config.state_file, root.join(".pocer/state"));
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn test_cli_attempts_override_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".pocer")).unwrap();
        fs::write(
            dir.path().join(".pocer/pocer.toml"),
            "[defaults]\nmax_attempts = 4\n",
        )
        .unwrap();

        let from_file = Config::new(dir.path().to_path_buf(), false, None).unwrap();
        assert_eq!(from_file.max_attempts, 4);

        let from_cli = Config::new(dir.path().to_path_buf(), false, Some(2)).unwrap();
        assert_eq!(from_cli.max_attempts, 2);
    }

    #[test]
    fn test_skeleton_paths_resolved_against_project() {
        let dir = tempdir().unwrap();
        let mut toml = PocerToml::default();
        toml.builder.skeleton = Some(PathBuf::from("skel/Test.sol"));
        let config = Config::from_toml(dir.path().to_path_buf(), toml, false, None);
        assert_eq!(
            config.builder.skeleton,
            Some(dir.path().join("skel/Test.sol"))
        );
        assert!(config.hacker.skeleton.is_none());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false, None).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.audit_dir.join("runs").exists());
        assert!(config.log_dir.exists());
        assert!(config.test_dir.exists());
        assert!(config.exploit_dir.exists());
    }

    #[test]
    fn test_claude_flags_stream_json() {
        let dir = tempdir().unwrap();
        let mut toml = PocerToml::default();
        toml.defaults.skip_permissions = false;
        let config = Config::from_toml(dir.path().to_path_buf(), toml, false, None);
        let flags = config.claude_flags();
        assert!(flags.contains(&"stream-json".to_string()));
        assert!(flags.contains(&"--print".to_string()));
    }
}
