use crate::config::Config;
use crate::errors::{StageError, StageKind};
use crate::prompts::{self, ModelReply};
use crate::stream::{ContentBlock, StreamEvent, describe_tool_use, tool_emoji, truncate_thinking};
use crate::ui::OrchestratorUI;
use crate::util::extract_json_object;
use anyhow::Context;
use chrono::Local;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Spawns the Claude CLI for one conversation turn and collects its reply.
///
/// Conversations are keyed by the uuid a [`crate::session::Session`] derives
/// per role. The first turn of a conversation is started with
/// `--session-id`; every later turn (including format re-prompts) continues
/// it with `--resume`.
pub struct ClaudeRunner {
    claude_cmd: String,
    flags: Vec<String>,
    work_dir: PathBuf,
    turn_dir: PathBuf,
    format_retries: u32,
    ui: Option<Arc<OrchestratorUI>>,
    started: Mutex<HashSet<Uuid>>,
    turns: AtomicU32,
}

impl ClaudeRunner {
    /// Turn logs go to a fresh directory under the configured log dir unless
    /// [`Self::with_turn_dir`] points them elsewhere.
    pub fn new(config: &Config, ui: Option<Arc<OrchestratorUI>>) -> Self {
        Self {
            claude_cmd: config.claude_cmd.clone(),
            flags: config.claude_flags(),
            work_dir: config.project_dir.clone(),
            turn_dir: default_turn_dir(&config.log_dir),
            format_retries: config.format_retries,
            ui,
            started: Mutex::new(HashSet::new()),
            turns: AtomicU32::new(0),
        }
    }

    /// Write per-turn prompt and output files into `dir`.
    pub fn with_turn_dir(mut self, dir: PathBuf) -> Self {
        self.turn_dir = dir;
        self
    }

    pub fn turn_dir(&self) -> &Path {
        &self.turn_dir
    }

    /// Conversation flags for the next turn of `conversation`.
    fn conversation_args(&self, conversation: Uuid) -> Vec<String> {
        let first_turn = self
            .started
            .lock()
            .map(|mut started| started.insert(conversation))
            .unwrap_or(false);
        if first_turn {
            vec!["--session-id".to_string(), conversation.to_string()]
        } else {
            vec!["--resume".to_string(), conversation.to_string()]
        }
    }

    /// Send `prompt` and parse the reply as `T`, re-prompting on the same
    /// conversation up to `format_retries` times when the reply is unusable.
    pub async fn invoke_structured<T: ModelReply>(
        &self,
        stage: StageKind,
        conversation: Uuid,
        model: Option<&str>,
        prompt: &str,
    ) -> Result<T, StageError> {
        let max_turns = self.format_retries + 1;
        let mut next_prompt = prompt.to_string();
        let mut reason = String::new();

        for turn in 1..=max_turns {
            let reply = self.invoke(stage, conversation, model, &next_prompt).await?;
            match parse_reply::<T>(&reply) {
                Ok(parsed) => return Ok(parsed),
                Err(why) => {
                    warn!(
                        stage = %stage,
                        turn,
                        reason = %why,
                        "model reply was not in the expected format"
                    );
                    if let Some(ref ui) = self.ui {
                        ui.log_step(&format!("{} reply unusable ({}), re-prompting", stage, why));
                    }
                    reason = why;
                    next_prompt = prompts::incorrect_format(T::FORMAT, &reason);
                }
            }
        }

        Err(StageError::MalformedOutput {
            attempts: max_turns,
            reason,
        })
    }

    /// Run one conversation turn and return the model's final text.
    pub async fn invoke(
        &self,
        stage: StageKind,
        conversation: Uuid,
        model: Option<&str>,
        prompt: &str,
    ) -> Result<String, StageError> {
        let turn = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        let prompt_file = self
            .turn_dir
            .join(format!("turn-{:03}-{}-prompt.md", turn, stage.role()));
        let output_file = self
            .turn_dir
            .join(format!("turn-{:03}-{}-output.log", turn, stage.role()));

        std::fs::create_dir_all(&self.turn_dir).map_err(|source| StageError::Io {
            path: self.turn_dir.clone(),
            source,
        })?;
        std::fs::write(&prompt_file, prompt).map_err(|source| StageError::Io {
            path: prompt_file.clone(),
            source,
        })?;

        let mut args = self.flags.clone();
        args.extend(self.conversation_args(conversation));
        if let Some(model) = model {
            args.push("--model".to_string());
            args.push(model.to_string());
        }

        let cmd_display = format!("{} {}", self.claude_cmd, args.join(" "));
        debug!(stage = %stage, command = %cmd_display, prompt_chars = prompt.len(), "spawning claude");
        if let Some(ref ui) = self.ui {
            ui.log_step(&format!("Spawning: {}", cmd_display));
        }

        let start = Instant::now();
        let mut child = Command::new(&self.claude_cmd)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&self.work_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StageError::ToolNotFound {
                tool: self.claude_cmd.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write prompt to claude stdin")?;
            stdin
                .shutdown()
                .await
                .context("Failed to close claude stdin")?;
        }

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let stdout = child.stdout.take().context("Failed to get claude stdout")?;
        let mut reader = BufReader::new(stdout).lines();

        let mut accumulated_text = String::new();
        let mut final_result: Option<String> = None;
        let mut is_error = false;

        let ui_clone = self.ui.clone();
        let elapsed_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(ref ui) = ui_clone {
                    ui.update_elapsed(start.elapsed());
                }
            }
        });

        while let Some(line) = reader
            .next_line()
            .await
            .context("Failed to read claude output")?
        {
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<StreamEvent>(&line) {
                Ok(StreamEvent::Assistant { message, .. }) => {
                    for content in message.content {
                        match content {
                            ContentBlock::ToolUse { name, input, .. } => {
                                let desc = describe_tool_use(&name, &input);
                                if let Some(ref ui) = self.ui {
                                    ui.show_tool_use(tool_emoji(&name), &desc);
                                }
                            }
                            ContentBlock::Text { text } => {
                                accumulated_text.push_str(&text);
                                accumulated_text.push('\n');
                                let snippet = truncate_thinking(&text, 60);
                                if !snippet.is_empty()
                                    && let Some(ref ui) = self.ui
                                {
                                    ui.show_thinking(&snippet);
                                }
                            }
                            ContentBlock::Other => {}
                        }
                    }
                }
                Ok(StreamEvent::Result {
                    result,
                    is_error: err,
                    ..
                }) => {
                    final_result = result;
                    is_error = err;
                }
                Ok(StreamEvent::User { .. }) | Ok(StreamEvent::System { .. }) => {}
                Err(_) => {
                    accumulated_text.push_str(&line);
                    accumulated_text.push('\n');
                }
            }
        }

        let status = child.wait().await.context("Failed to wait for claude")?;
        elapsed_task.abort();

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);
        let text = final_result.unwrap_or(accumulated_text);

        std::fs::write(&output_file, &text).map_err(|source| StageError::Io {
            path: output_file.clone(),
            source,
        })?;

        info!(
            stage = %stage,
            turn,
            exit_code,
            elapsed_ms = duration.as_millis() as u64,
            output_chars = text.len(),
            "claude turn finished"
        );
        if let Some(ref ui) = self.ui {
            ui.log_step(&format!(
                "Completed in {:.1}s (exit: {})",
                duration.as_secs_f64(),
                exit_code
            ));
        }

        if is_error || (exit_code != 0 && text.trim().is_empty()) {
            let detail = if stderr.trim().is_empty() {
                text
            } else {
                stderr
            };
            return Err(StageError::ToolFailed {
                tool: self.claude_cmd.clone(),
                exit_code,
                stderr: detail.trim().to_string(),
            });
        }

        Ok(text)
    }
}

/// A per-runner directory for turn logs, unique across runs.
fn default_turn_dir(log_dir: &Path) -> PathBuf {
    let id = Uuid::new_v4().simple().to_string();
    log_dir.join(format!(
        "{}-{}",
        Local::now().format("%Y-%m-%d_%H-%M-%S"),
        &id[..8]
    ))
}

/// Pull the JSON object out of a model reply and deserialize it.
fn parse_reply<T: ModelReply>(text: &str) -> Result<T, String> {
    let json = extract_json_object(text).ok_or_else(|| "no JSON object found".to_string())?;
    serde_json::from_str(&json).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pocer_config::PocerToml;
    use crate::prompts::{AnalysisReply, BuildReply};
    use tempfile::tempdir;

    fn runner_with(claude_cmd: &str, dir: &std::path::Path) -> ClaudeRunner {
        let mut toml = PocerToml::default();
        toml.project.claude_cmd = Some(claude_cmd.to_string());
        toml.defaults.format_retries = 1;
        let config = Config::from_toml(dir.to_path_buf(), toml, false, None);
        ClaudeRunner::new(&config, None)
    }

    #[test]
    fn test_parse_reply_from_surrounding_text() {
        let text = "Here you go:\n{\"my_test_code\": \"contract T { function f() public {} }\", \"my_explanation\": \"ok\"}\nthanks";
        let reply: BuildReply = parse_reply(text).unwrap();
        assert!(reply.my_test_code.contains("function f()"));
    }

    #[test]
    fn test_parse_reply_rejects_missing_object() {
        let err = parse_reply::<AnalysisReply>("I could not decide").unwrap_err();
        assert!(err.contains("no JSON object"));
    }

    #[test]
    fn test_parse_reply_rejects_wrong_shape() {
        assert!(parse_reply::<AnalysisReply>(r#"{"verdict": "fine"}"#).is_err());
    }

    #[test]
    fn test_first_turn_uses_session_id_then_resume() {
        let dir = tempdir().unwrap();
        let runner = runner_with("claude", dir.path());
        let conversation = Uuid::new_v4();
        let first = runner.conversation_args(conversation);
        let second = runner.conversation_args(conversation);
        assert_eq!(first[0], "--session-id");
        assert_eq!(second[0], "--resume");
        assert_eq!(first[1], second[1]);

        let other = runner.conversation_args(Uuid::new_v4());
        assert_eq!(other[0], "--session-id");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_turn_logs_from_separate_runs_are_kept() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("fake-claude.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\nprintf '%s\\n' '{\"type\":\"result\",\"subtype\":\"success\",\"result\":\"ok\",\"is_error\":false}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let first = runner_with(&script.to_string_lossy(), dir.path());
        let second = runner_with(&script.to_string_lossy(), dir.path());
        assert_ne!(first.turn_dir(), second.turn_dir());

        let reply = first
            .invoke(StageKind::Build, Uuid::new_v4(), None, "first run prompt")
            .await
            .unwrap();
        assert_eq!(reply, "ok");
        second
            .invoke(StageKind::Build, Uuid::new_v4(), None, "second run prompt")
            .await
            .unwrap();

        let read = |runner: &ClaudeRunner| {
            std::fs::read_to_string(runner.turn_dir().join("turn-001-builder-prompt.md")).unwrap()
        };
        assert_eq!(read(&first), "first run prompt");
        assert_eq!(read(&second), "second run prompt");
        assert!(first.turn_dir().join("turn-001-builder-output.log").exists());
    }

    #[test]
    fn test_with_turn_dir_overrides_default() {
        let dir = tempdir().unwrap();
        let runner = runner_with("claude", dir.path()).with_turn_dir(dir.path().join("run-a"));
        assert_eq!(runner.turn_dir(), dir.path().join("run-a"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let dir = tempdir().unwrap();
        let runner = runner_with("/nonexistent/claude-binary", dir.path());
        let err = runner
            .invoke(StageKind::Build, Uuid::new_v4(), None, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::ToolNotFound { .. }));
    }
}
