use super::context::SourceContext;
use super::{ClaudeRunner, TestStage};
use crate::artifact::ArtifactStore;
use crate::errors::{StageError, StageKind};
use crate::forge::ForgeRunner;
use crate::pocer_config::StageSection;
use crate::prompts::{self, AnalysisPrompt, AnalysisReply};
use crate::session::Session;
use crate::status::{Classification, ExecutionResult, Status};
use crate::target::{ArtifactKind, Target};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const ANALYSIS_FAILED: &str = "failed to analyze the forge output";

/// Runs `forge test` and asks Claude to attribute failures.
pub struct ForgeTester {
    forge: ForgeRunner,
    claude: Arc<ClaudeRunner>,
    sources: SourceContext,
    store: Arc<ArtifactStore>,
    settings: StageSection,
}

impl ForgeTester {
    pub fn new(
        forge: ForgeRunner,
        claude: Arc<ClaudeRunner>,
        sources: SourceContext,
        store: Arc<ArtifactStore>,
        settings: StageSection,
    ) -> Self {
        Self {
            forge,
            claude,
            sources,
            store,
            settings,
        }
    }

    fn artifact_or_placeholder(
        &self,
        target: &Target,
        kind: ArtifactKind,
    ) -> Result<String, StageError> {
        Ok(self
            .store
            .get(target, kind)?
            .unwrap_or_else(|| format!("// {} file was not generated", kind)))
    }
}

#[async_trait]
impl TestStage for ForgeTester {
    async fn run(&self, target: &Target) -> Result<ExecutionResult, StageError> {
        let result = self.forge.test(target).await?;
        info!(target = %target, succeeded = result.succeeded, "forge test finished");
        Ok(result)
    }

    async fn classify(
        &self,
        target: &Target,
        session: &Session,
        result: &ExecutionResult,
    ) -> Result<Classification, StageError> {
        if result.succeeded {
            return Ok(Classification::new(
                Status::Success,
                "The exploit was successfully executed.",
                "No further action required.",
            ));
        }

        let source = self.sources.read_source(target)?;
        let test_code = self.artifact_or_placeholder(target, ArtifactKind::Test)?;
        let exploit_code = self.artifact_or_placeholder(target, ArtifactKind::Exploit)?;
        let test_name = target.artifact_file_name(ArtifactKind::Test);
        let exploit_name = target.artifact_file_name(ArtifactKind::Exploit);

        let prompt = prompts::analysis_prompt(&AnalysisPrompt {
            source_name: target.file_name(),
            source: &source,
            test_name: &test_name,
            test_code: &test_code,
            exploit_name: &exploit_name,
            exploit_code: &exploit_code,
            output: &result.output_text,
        });

        let reply = self
            .claude
            .invoke_structured::<AnalysisReply>(
                StageKind::Test,
                session.conversation(StageKind::Test),
                self.settings.model.as_deref(),
                &prompt,
            )
            .await;

        match reply {
            Ok(reply) => {
                let status: Status = reply.status.parse()?;
                info!(target = %target, status = %status, "failure classified");
                Ok(Classification::new(status, reply.feedback, reply.suggestions))
            }
            Err(StageError::MalformedOutput { attempts, reason }) => {
                warn!(target = %target, attempts, reason = %reason, "tester reply unusable");
                Ok(Classification::new(
                    Status::Unknown,
                    ANALYSIS_FAILED,
                    "Manual inspection is required.",
                ))
            }
            Err(e) => Err(e),
        }
    }
}
