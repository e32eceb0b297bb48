//! Local Solidity import resolution for prompt context.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use tracing::warn;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:\{[^}]+\}\s+from\s+)?(?:"|')(.*?\.sol)(?:"|')\s*;"#)
        .expect("import pattern is a valid static regex")
});

/// Resolves `import "./X.sol";` and `import {A} from "./X.sol";` recursively
/// relative to the importing file. Contents are cached by file name for the
/// whole batch.
#[derive(Debug, Default)]
pub struct ImportResolver {
    cache: Mutex<HashMap<String, String>>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All files transitively imported by `source`, keyed by file name.
    pub fn resolve(&self, source: &str, dir: &Path) -> BTreeMap<String, String> {
        let mut found = BTreeMap::new();
        self.collect(source, dir, &mut found);
        found
    }

    /// Imported files rendered as delimited blocks for a prompt.
    pub fn render(&self, source: &str, dir: &Path) -> String {
        let found = self.resolve(source, dir);
        if found.is_empty() {
            return "No import data".to_string();
        }
        found
            .iter()
            .map(|(name, content)| {
                format!("// Begin import {}\n{}\n// End import {}", name, content, name)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn collect(&self, source: &str, dir: &Path, found: &mut BTreeMap<String, String>) {
        for capture in IMPORT_RE.captures_iter(source) {
            let import_path = capture[1].trim_start_matches("./");
            let abs_path = dir.join(import_path);
            let Some(name) = abs_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
            else {
                continue;
            };

            if found.contains_key(&name) {
                continue;
            }

            let content = match self.cached(&name) {
                Some(content) => content,
                None => match std::fs::read_to_string(&abs_path) {
                    Ok(content) => {
                        self.cache_insert(&name, &content);
                        content
                    }
                    Err(_) => {
                        warn!(path = %abs_path.display(), "imported file not found on disk");
                        let placeholder = format!("// Could not find {}", name);
                        self.cache_insert(&name, &placeholder);
                        placeholder
                    }
                },
            };

            found.insert(name, content.clone());
            let parent = abs_path.parent().unwrap_or(dir);
            self.collect(&content, parent, found);
        }
    }

    fn cached(&self, name: &str) -> Option<String> {
        self.cache.lock().ok().and_then(|c| c.get(name).cloned())
    }

    fn cache_insert(&self, name: &str, content: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), content.to_string());
        }
    }
}
