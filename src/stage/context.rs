use crate::analysis::StaticAnalysis;
use crate::errors::StageError;
use crate::imports::ImportResolver;
use crate::target::Target;
use std::path::PathBuf;
use std::sync::Arc;

/// Source-side prompt material shared by the builder and the hacker.
#[derive(Clone)]
pub struct SourceContext {
    src_dir: PathBuf,
    analysis: Arc<StaticAnalysis>,
    imports: Arc<ImportResolver>,
}

/// Everything known about a target's source contract.
#[derive(Debug, Clone)]
pub struct SourceBundle {
    pub source: String,
    pub bugs: String,
    pub imports: String,
}

impl SourceContext {
    pub fn new(
        src_dir: PathBuf,
        analysis: Arc<StaticAnalysis>,
        imports: Arc<ImportResolver>,
    ) -> Self {
        Self {
            src_dir,
            analysis,
            imports,
        }
    }

    pub fn read_source(&self, target: &Target) -> Result<String, StageError> {
        let path = self.src_dir.join(target.file_name());
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StageError::SourceNotFound { path }
            } else {
                StageError::Io { path, source }
            }
        })
    }

    pub fn bundle(&self, target: &Target) -> Result<SourceBundle, StageError> {
        let source = self.read_source(target)?;
        let imports = self.imports.render(&source, &self.src_dir);
        Ok(SourceBundle {
            bugs: self.analysis.prompt_text(target),
            imports,
            source,
        })
    }
}

/// Read an optional skeleton file.
pub fn read_skeleton(path: Option<&PathBuf>) -> Result<Option<String>, StageError> {
    path.map(|p| {
        std::fs::read_to_string(p).map_err(|source| StageError::Io {
            path: p.clone(),
            source,
        })
    })
    .transpose()
}
