use super::context::{SourceContext, read_skeleton};
use super::{ClaudeRunner, ExploitStage, FailureContext};
use crate::artifact::ArtifactStore;
use crate::errors::{StageError, StageKind};
use crate::pocer_config::StageSection;
use crate::prompts::{self, ExploitPrompt, ExploitReply};
use crate::session::Session;
use crate::target::{ArtifactKind, Target};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Writes the exploit contract for a target through Claude.
pub struct ClaudeHacker {
    claude: Arc<ClaudeRunner>,
    sources: SourceContext,
    store: Arc<ArtifactStore>,
    settings: StageSection,
}

impl ClaudeHacker {
    pub fn new(
        claude: Arc<ClaudeRunner>,
        sources: SourceContext,
        store: Arc<ArtifactStore>,
        settings: StageSection,
    ) -> Self {
        Self {
            claude,
            sources,
            store,
            settings,
        }
    }
}

#[async_trait]
impl ExploitStage for ClaudeHacker {
    async fn attempt(
        &self,
        target: &Target,
        session: &Session,
        test_code: &str,
        prior: Option<&FailureContext>,
    ) -> Result<(), StageError> {
        let bundle = self.sources.bundle(target)?;
        let skeleton = read_skeleton(self.settings.skeleton.as_ref())?;

        let prompt = prompts::exploit_prompt(&ExploitPrompt {
            source_name: target.file_name(),
            stem: target.stem(),
            source: &bundle.source,
            bugs: &bundle.bugs,
            imports: &bundle.imports,
            test_code,
            skeleton: skeleton.as_deref(),
            prior,
        });

        let reply: ExploitReply = self
            .claude
            .invoke_structured(
                StageKind::Exploit,
                session.conversation(StageKind::Exploit),
                self.settings.model.as_deref(),
                &prompt,
            )
            .await?;

        let path = self
            .store
            .put(target, ArtifactKind::Exploit, &reply.my_attempt)?;
        info!(
            target = %target,
            path = %path.display(),
            explanation = %reply.my_explanation,
            "exploit written"
        );
        Ok(())
    }
}
