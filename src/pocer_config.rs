//! File-based configuration for pocer.
//!
//! Settings are read from `.pocer/pocer.toml`, then overridden by environment
//! variables, then by CLI flags (applied in [`crate::config::Config`]).
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! claude_cmd = "claude"
//! forge_cmd = "forge"
//! analyzer_cmd = "/opt/olympix/olympix"
//! analysis_file = "analysis.json"
//! src_dir = "src"
//! test_dir = "test"
//! exploit_dir = "exploits"
//!
//! [defaults]
//! max_attempts = 7
//! output_limit = 4000
//! format_retries = 3
//! skip_permissions = true
//!
//! [builder]
//! model = "opus"
//! skeleton = "skeletons/TestSkeleton.sol"
//!
//! [hacker]
//! skeleton = "skeletons/ExploitSkeleton.sol"
//!
//! [tester]
//! model = "sonnet"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "pocer.toml";

/// Project layout and external tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Claude CLI command (default: "claude")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
    /// Foundry forge command (default: "forge")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge_cmd: Option<String>,
    /// Static analyzer executable. No analysis is run when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_cmd: Option<PathBuf>,
    /// Precomputed analyzer JSON, used instead of running the analyzer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_file: Option<PathBuf>,
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,
    #[serde(default = "default_test_dir")]
    pub test_dir: PathBuf,
    #[serde(default = "default_exploit_dir")]
    pub exploit_dir: PathBuf,
    /// Run log directory (default: `.pocer/logs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_src_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_test_dir() -> PathBuf {
    PathBuf::from("test")
}

fn default_exploit_dir() -> PathBuf {
    PathBuf::from("exploits")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            claude_cmd: None,
            forge_cmd: None,
            analyzer_cmd: None,
            analysis_file: None,
            src_dir: default_src_dir(),
            test_dir: default_test_dir(),
            exploit_dir: default_exploit_dir(),
            log_dir: None,
        }
    }
}

/// Run-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Attempt cycles per target before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Characters of forge output kept (from the end)
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,
    /// Re-prompts allowed when a model answers in the wrong format
    #[serde(default = "default_format_retries")]
    pub format_retries: u32,
    /// Whether to skip permission prompts for Claude CLI
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
}

fn default_max_attempts() -> u32 {
    7
}

fn default_output_limit() -> usize {
    4000
}

fn default_format_retries() -> u32 {
    3
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            output_limit: default_output_limit(),
            format_retries: default_format_retries(),
            skip_permissions: default_skip_permissions(),
        }
    }
}

/// Per-stage model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSection {
    /// Model alias passed to `claude --model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Skeleton file the generated artifact must follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<PathBuf>,
}

/// The complete pocer.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PocerToml {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub builder: StageSection,
    #[serde(default)]
    pub hacker: StageSection,
    #[serde(default)]
    pub tester: StageSection,
}

impl PocerToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse pocer.toml")
    }

    /// Load `<pocer_dir>/pocer.toml`, or defaults when it does not exist.
    pub fn load_or_default(pocer_dir: &Path) -> Result<Self> {
        let config_path = pocer_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize pocer.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Claude command, with fallback to the `CLAUDE_CMD` environment variable.
    pub fn claude_cmd(&self) -> String {
        self.project
            .claude_cmd
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Forge command, with fallback to the `FORGE_CMD` environment variable.
    pub fn forge_cmd(&self) -> String {
        self.project
            .forge_cmd
            .clone()
            .or_else(|| std::env::var("FORGE_CMD").ok())
            .unwrap_or_else(|| "forge".to_string())
    }

    /// `SKIP_PERMISSIONS` overrides the file setting.
    pub fn skip_permissions(&self) -> bool {
        if let Ok(env_val) = std::env::var("SKIP_PERMISSIONS") {
            return env_val != "false";
        }
        self.defaults.skip_permissions
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.defaults.max_attempts == 0 {
            warnings.push("max_attempts is 0: every target would fail immediately".to_string());
        }
        if self.defaults.output_limit == 0 {
            warnings.push("output_limit is 0: the tester would see no forge output".to_string());
        }
        if self.project.analyzer_cmd.is_some() && self.project.analysis_file.is_some() {
            warnings.push(
                "both analyzer_cmd and analysis_file are set: analysis_file takes precedence"
                    .to_string(),
            );
        }
        for (stage, section) in [("builder", &self.builder), ("hacker", &self.hacker)] {
            if let Some(ref skeleton) = section.skeleton
                && skeleton.as_os_str().is_empty()
            {
                warnings.push(format!("[{}] skeleton path is empty", stage));
            }
        }
        if self.tester.skeleton.is_some() {
            warnings.push("[tester] skeleton is ignored".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let toml = PocerToml::default();
        assert_eq!(toml.defaults.max_attempts, 7);
        assert_eq!(toml.defaults.output_limit, 4000);
        assert_eq!(toml.defaults.format_retries, 3);
        assert!(toml.defaults.skip_permissions);
        assert_eq!(toml.project.src_dir, PathBuf::from("src"));
        assert_eq!(toml.project.exploit_dir, PathBuf::from("exploits"));
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let toml = PocerToml::parse(
            r#"
[defaults]
max_attempts = 3

[builder]
model = "opus"
"#,
        )
        .unwrap();
        assert_eq!(toml.defaults.max_attempts, 3);
        assert_eq!(toml.defaults.output_limit, 4000);
        assert_eq!(toml.builder.model.as_deref(), Some("opus"));
        assert!(toml.hacker.model.is_none());
    }

    #[test]
    fn test_parse_project_section() {
        let toml = PocerToml::parse(
            r#"
[project]
claude_cmd = "/usr/local/bin/claude"
analyzer_cmd = "/opt/olympix"
src_dir = "contracts"
"#,
        )
        .unwrap();
        assert_eq!(toml.project.claude_cmd.as_deref(), Some("/usr/local/bin/claude"));
        assert_eq!(toml.project.analyzer_cmd, Some(PathBuf::from("/opt/olympix")));
        assert_eq!(toml.project.src_dir, PathBuf::from("contracts"));
        assert_eq!(toml.project.test_dir, PathBuf::from("test"));
    }

    #[test]
    fn test_parse_invalid_toml_errors() {
        assert!(PocerToml::parse("[defaults\nmax_attempts = ").is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut toml = PocerToml::default();
        toml.defaults.max_attempts = 4;
        toml.hacker.skeleton = Some(PathBuf::from("skel/Exploit.sol"));
        let path = dir.path().join(CONFIG_FILE_NAME);
        toml.save(&path).unwrap();

        let loaded = PocerToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.defaults.max_attempts, 4);
        assert_eq!(loaded.hacker.skeleton, Some(PathBuf::from("skel/Exploit.sol")));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = PocerToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.defaults.max_attempts, 7);
    }

    #[test]
    fn test_validate_flags_zero_attempts_and_both_analysis_sources() {
        let mut toml = PocerToml::default();
        toml.defaults.max_attempts = 0;
        toml.project.analyzer_cmd = Some(PathBuf::from("olympix"));
        toml.project.analysis_file = Some(PathBuf::from("analysis.json"));
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("max_attempts"));
        assert!(warnings[1].contains("analysis_file"));
    }
}
