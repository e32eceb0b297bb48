//! Attempt-to-attempt artifact diffs for the audit trail.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

const CONTEXT_RADIUS: usize = 3;

/// Difference between an artifact before and after a regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptDiff {
    /// No previous content existed.
    Created { lines: usize, unified: String },
    Modified {
        lines_added: usize,
        lines_removed: usize,
        unified: String,
    },
    Unchanged,
    /// The previous snapshot could not be read; nothing to compare against.
    Unavailable,
}

impl AttemptDiff {
    pub fn is_change(&self) -> bool {
        matches!(self, AttemptDiff::Created { .. } | AttemptDiff::Modified { .. })
    }

    /// One-line summary for progress output.
    pub fn summary(&self) -> String {
        match self {
            AttemptDiff::Created { lines, .. } => format!("created ({} lines)", lines),
            AttemptDiff::Modified {
                lines_added,
                lines_removed,
                ..
            } => format!("modified (+{} -{})", lines_added, lines_removed),
            AttemptDiff::Unchanged => "no changes".to_string(),
            AttemptDiff::Unavailable => String::new(),
        }
    }

    /// Full human-readable text.
    pub fn render(&self) -> String {
        match self {
            AttemptDiff::Created { lines, unified } => {
                format!("File created ({} lines):\n{}", lines, unified)
            }
            AttemptDiff::Modified { unified, .. } => unified.clone(),
            AttemptDiff::Unchanged => "No changes.".to_string(),
            AttemptDiff::Unavailable => String::new(),
        }
    }
}

/// Diff `old` against `new`. `label` names the artifact in the unified headers.
pub fn diff(old: Option<&str>, new: &str, label: &str) -> AttemptDiff {
    let Some(old) = old else {
        let unified = TextDiff::from_lines("", new)
            .unified_diff()
            .context_radius(CONTEXT_RADIUS)
            .header("/dev/null", &format!("Current {}", label))
            .to_string();
        return AttemptDiff::Created {
            lines: new.lines().count(),
            unified,
        };
    };

    if old == new {
        return AttemptDiff::Unchanged;
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut lines_added = 0;
    let mut lines_removed = 0;
    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => lines_added += 1,
            ChangeTag::Delete => lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let unified = text_diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(&format!("Previous {}", label), &format!("Current {}", label))
        .to_string();

    AttemptDiff::Modified {
        lines_added,
        lines_removed,
        unified,
    }
}
