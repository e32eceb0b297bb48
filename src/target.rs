//! Targets: one source contract per unit of work.

use anyhow::{Context, Result, anyhow};
use glob::glob;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of generated artifact a target owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Test harness written by the builder stage (`test/<Stem>Test.sol`).
    Test,
    /// Exploit contract written by the hacker stage (`exploits/<Stem>Exploit.sol`).
    Exploit,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Test => "test",
            ArtifactKind::Exploit => "exploit",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A source contract file name, e.g. `Vault.sol`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    file_name: String,
}

impl Target {
    /// Create a target from a file name, appending `.sol` when missing.
    pub fn new(name: &str) -> Self {
        let file_name = if name.ends_with(".sol") {
            name.to_string()
        } else {
            format!("{}.sol", name)
        };
        Self { file_name }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without the `.sol` extension; also the forge contract filter.
    pub fn stem(&self) -> &str {
        self.file_name
            .strip_suffix(".sol")
            .unwrap_or(&self.file_name)
    }

    /// File name of the artifact of `kind` for this target.
    pub fn artifact_file_name(&self, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Test => format!("{}Test.sol", self.stem()),
            ArtifactKind::Exploit => format!("{}Exploit.sol", self.stem()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Resolve the targets for a run: the named file, or every `*.sol` in `src_dir`.
pub fn resolve_targets(src_dir: &Path, file: Option<&str>) -> Result<Vec<Target>> {
    if let Some(name) = file {
        let target = Target::new(name);
        if !src_dir.join(target.file_name()).is_file() {
            return Err(anyhow!(
                "Target '{}' not found in {}",
                target,
                src_dir.display()
            ));
        }
        return Ok(vec![target]);
    }
    discover_targets(src_dir)
}

/// List every `*.sol` file directly inside `src_dir`, sorted by name.
pub fn discover_targets(src_dir: &Path) -> Result<Vec<Target>> {
    let pattern = src_dir.join("*.sol").to_string_lossy().to_string();

    let mut targets: Vec<Target> = glob(&pattern)
        .context("Failed to read glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(Target::new)
        })
        .collect();

    targets.sort();
    Ok(targets)
}
