//! Static analysis findings keyed by source file name.
//!
//! The analyzer is run once per batch (`<analyzer> analyze -w . --output-format json`
//! inside the source directory), or a precomputed report is loaded instead.
//! Its stdout may carry banner text around the report, so the outermost JSON
//! object is extracted before parsing.

use crate::config::Config;
use crate::errors::StageError;
use crate::target::Target;
use crate::util::extract_json_object;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct StaticAnalysis {
    bugs: HashMap<String, Vec<Value>>,
}

impl StaticAnalysis {
    /// No findings for any file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load findings according to the project configuration: a precomputed
    /// report wins over running the analyzer; neither configured means empty.
    pub async fn load(config: &Config) -> Result<Self, StageError> {
        if let Some(ref file) = config.analysis_file {
            info!(path = %file.display(), "loading precomputed analysis");
            return Self::from_file(file);
        }
        if let Some(ref analyzer) = config.analyzer_cmd {
            return Self::run(analyzer, &config.src_dir).await;
        }
        info!("no analyzer configured, continuing without findings");
        Ok(Self::empty())
    }

    /// Run the analyzer in `src_dir` and parse its JSON report.
    pub async fn run(analyzer: &Path, src_dir: &Path) -> Result<Self, StageError> {
        let tool = analyzer.display().to_string();
        info!(analyzer = %tool, dir = %src_dir.display(), "running static analysis");

        let output = Command::new(analyzer)
            .args(["analyze", "-w", ".", "--output-format", "json"])
            .current_dir(src_dir)
            .output()
            .await
            .map_err(|source| StageError::ToolNotFound {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(StageError::ToolFailed {
                tool,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn from_file(path: &Path) -> Result<Self, StageError> {
        let text = std::fs::read_to_string(path).map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse analyzer output into the `file name -> bugs` map.
    pub fn parse(text: &str) -> Result<Self, StageError> {
        let json = extract_json_object(text)
            .ok_or_else(|| StageError::Analysis("no JSON object in analyzer output".to_string()))?;
        let report: Value =
            serde_json::from_str(&json).map_err(|e| StageError::Analysis(e.to_string()))?;

        let mut bugs = HashMap::new();
        let files = report
            .get("files")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for file in files {
            let Some(path) = file.get("path").and_then(Value::as_str) else {
                warn!("analysis entry without a path, skipping");
                continue;
            };
            let normalized = path.replace('\\', "/");
            let name = normalized.rsplit('/').next().unwrap_or(&normalized).to_string();
            let file_bugs = file
                .get("bugs")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            bugs.insert(name, file_bugs);
        }

        info!(files = bugs.len(), "static analysis loaded");
        Ok(Self { bugs })
    }

    pub fn bugs_for(&self, target: &Target) -> &[Value] {
        self.bugs
            .get(target.file_name())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Findings for `target` rendered for a prompt.
    pub fn prompt_text(&self, target: &Target) -> String {
        let bugs = self.bugs_for(target);
        if bugs.is_empty() {
            return "No findings reported for this file.".to_string();
        }
        serde_json::to_string_pretty(bugs).unwrap_or_else(|_| format!("{:?}", bugs))
    }

    pub fn file_count(&self) -> usize {
        self.bugs.len()
    }
}
