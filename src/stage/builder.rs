use super::context::{SourceContext, read_skeleton};
use super::{BuildStage, ClaudeRunner, FailureContext};
use crate::artifact::ArtifactStore;
use crate::errors::{StageError, StageKind};
use crate::pocer_config::StageSection;
use crate::prompts::{self, BuildPrompt, BuildReply};
use crate::session::Session;
use crate::target::{ArtifactKind, Target};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Writes the Foundry test harness for a target through Claude.
pub struct ClaudeBuilder {
    claude: Arc<ClaudeRunner>,
    sources: SourceContext,
    store: Arc<ArtifactStore>,
    settings: StageSection,
}

impl ClaudeBuilder {
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
impl BuildStage for ClaudeBuilder {
    async fn attempt(
        &self,
        target: &Target,
        session: &Session,
        prior: Option<&FailureContext>,
    ) -> Result<(), StageError> {
        let bundle = self.sources.bundle(target)?;
        let skeleton = read_skeleton(self.settings.skeleton.as_ref())?;
        let current_test = match prior {
            Some(_) => self.store.get(target, ArtifactKind::Test)?,
            None => None,
        };

        let prompt = prompts::build_prompt(&BuildPrompt {
            source_name: target.file_name(),
            stem: target.stem(),
            source: &bundle.source,
            bugs: &bundle.bugs,
            imports: &bundle.imports,
            skeleton: skeleton.as_deref(),
            prior,
            current_test: current_test.as_deref(),
        });

        let reply: BuildReply = self
            .claude
            .invoke_structured(
                StageKind::Build,
                session.conversation(StageKind::Build),
                self.settings.model.as_deref(),
                &prompt,
            )
            .await?;

        let path = self
            .store
            .put(target, ArtifactKind::Test, &reply.my_test_code)?;
        info!(
            target = %target,
            path = %path.display(),
            explanation = %reply.my_explanation,
            "test harness written"
        );
        Ok(())
    }
}
