//! Per-target conversation identity.
//!
//! A [`Session`] is created by the orchestrator when a target's run starts and
//! passed explicitly into every stage call. Each stage role gets its own
//! conversation derived deterministically from the session id, so the builder,
//! hacker and tester threads of one target never share history and no two
//! targets ever share a thread.

use crate::errors::StageKind;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
}

impl Session {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Conversation id used for `stage` within this session.
    pub fn conversation(&self, stage: StageKind) -> Uuid {
        Uuid::new_v5(&self.id, stage.role().as_bytes())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_distinct() {
        assert_ne!(Session::new().id(), Session::new().id());
    }

    #[test]
    fn test_conversation_is_stable_per_role() {
        let session = Session::new();
        assert_eq!(
            session.conversation(StageKind::Build),
            session.conversation(StageKind::Build)
        );
        assert_ne!(
            session.conversation(StageKind::Build),
            session.conversation(StageKind::Exploit)
        );
        assert_ne!(
            session.conversation(StageKind::Exploit),
            session.conversation(StageKind::Test)
        );
    }

    #[test]
    fn test_conversations_differ_across_sessions() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.conversation(StageKind::Test), b.conversation(StageKind::Test));
    }
}
