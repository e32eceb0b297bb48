//! Classified attempt outcomes.
//!
//! The tester stage reports one of exactly four tags. They are parsed into
//! [`Status`] at the boundary so the orchestrator can match exhaustively;
//! anything else is rejected as [`InvalidStatusTag`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classified outcome of one test-stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The exploit passed the test harness.
    Success,
    /// The test harness is at fault; rebuild it next cycle.
    #[serde(rename = "builder_error")]
    BuildError,
    /// The exploit is at fault; regenerate it next cycle.
    #[serde(rename = "hacker_failure")]
    ExploitFailure,
    /// The classifier could not attribute fault. Never retried.
    Unknown,
}

impl Status {
    /// Wire tag used by the tester stage.
    pub fn tag(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::BuildError => "builder_error",
            Status::ExploitFailure => "hacker_failure",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A status tag outside the four-value domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "invalid status tag '{0}': expected one of success, builder_error, hacker_failure, unknown"
)]
pub struct InvalidStatusTag(pub String);

impl FromStr for Status {
    type Err = InvalidStatusTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "success" => Ok(Status::Success),
            "builder_error" => Ok(Status::BuildError),
            "hacker_failure" => Ok(Status::ExploitFailure),
            "unknown" => Ok(Status::Unknown),
            other => Err(InvalidStatusTag(other.to_string())),
        }
    }
}

/// Raw result of executing the test harness, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output_text: String,
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn new(output_text: impl Into<String>, succeeded: bool) -> Self {
        Self {
            output_text: output_text.into(),
            succeeded,
        }
    }
}

/// Classifier verdict for a failed execution plus the feedback handed to the
/// stage that gets regenerated next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: Status,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: String,
}

impl Classification {
    pub fn new(
        status: Status,
        feedback: impl Into<String>,
        suggestions: impl Into<String>,
    ) -> Self {
        Self {
            status,
            feedback: feedback.into(),
            suggestions: suggestions.into(),
        }
    }

    /// Render as the prior-failure analysis block fed back into prompts.
    pub fn as_prompt_context(&self) -> String {
        format!(
            "status: {}\nfeedback: {}\nsuggestions: {}",
            self.status, self.feedback, self.suggestions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_valid_tags() {
        assert_eq!("success".parse::<Status>().unwrap(), Status::Success);
        assert_eq!("builder_error".parse::<Status>().unwrap(), Status::BuildError);
        assert_eq!(
            "hacker_failure".parse::<Status>().unwrap(),
            Status::ExploitFailure
        );
        assert_eq!("unknown".parse::<Status>().unwrap(), Status::Unknown);
    }

    #[test]
    fn test_parse_rejects_unrecognized_tag() {
        let err = "builder_failure".parse::<Status>().unwrap_err();
        assert_eq!(err, InvalidStatusTag("builder_failure".to_string()));
        assert!(err.to_string().contains("builder_failure"));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("SUCCESS".parse::<Status>().is_err());
    }

    #[test]
    fn test_tag_matches_display() {
        for status in [
            Status::Success,
            Status::BuildError,
            Status::ExploitFailure,
            Status::Unknown,
        ] {
            assert_eq!(status.to_string(), status.tag());
            assert_eq!(status.tag().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn test_serde_uses_wire_tags() {
        let json = serde_json::to_string(&Status::ExploitFailure).unwrap();
        assert_eq!(json, "\"hacker_failure\"");
        let parsed: Status = serde_json::from_str("\"builder_error\"").unwrap();
        assert_eq!(parsed, Status::BuildError);
    }

    #[test]
    fn test_classification_prompt_context() {
        let c = Classification::new(Status::BuildError, "missing import", "import the exploit");
        let ctx = c.as_prompt_context();
        assert!(ctx.contains("builder_error"));
        assert!(ctx.contains("missing import"));
        assert!(ctx.contains("import the exploit"));
    }
}
