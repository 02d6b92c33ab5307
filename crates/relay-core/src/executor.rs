//! The executor boundary: turns a prompt into artifact text.
//!
//! relay never talks to a model directly. `ProcessExecutor` shells out to the
//! configured backend and treats stdout as the artifact; tests plug in their
//! own `Executor`.

use crate::config::{Config, ExecutorBackend};
use crate::types::Stage;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub agent: String,
    pub stage: Stage,
    pub prompt: String,
    pub project_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with code {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("produced no output")]
    EmptyOutput,

    #[error("output rejected: {0}")]
    Rejected(String),
}

pub trait Executor: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: &'a AgentRequest,
    ) -> BoxFuture<'a, Result<String, ExecutorError>>;

    /// Per-agent wall-clock limit; `None` means unbounded.
    fn timeout(&self, _agent: &str) -> Option<Duration> {
        None
    }
}

// ---------------------------------------------------------------------------
// ProcessExecutor
// ---------------------------------------------------------------------------

/// Runs each agent as a child process. The prompt always goes on stdin: it
/// carries every input artifact and can exceed the per-argument limit.
pub struct ProcessExecutor {
    config: Config,
}

impl ProcessExecutor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

/// argv for `backend`; the prompt is never part of it.
pub fn build_argv(backend: &ExecutorBackend) -> Vec<String> {
    match backend {
        ExecutorBackend::Claude {
            model,
            allowed_tools,
            permission_mode,
            ..
        } => {
            let mut argv = vec![
                "claude".to_string(),
                "-p".to_string(),
                "--model".to_string(),
                model.clone(),
            ];
            if !allowed_tools.is_empty() {
                argv.push("--allowedTools".to_string());
                argv.push(allowed_tools.join(","));
            }
            if let Some(mode) = permission_mode {
                argv.push("--permission-mode".to_string());
                argv.push(mode.clone());
            }
            argv
        }
        ExecutorBackend::Command { program, args, .. } => {
            let mut argv = vec![program.clone()];
            argv.extend(args.iter().cloned());
            argv
        }
    }
}

impl Executor for ProcessExecutor {
    fn execute<'a>(
        &'a self,
        request: &'a AgentRequest,
    ) -> BoxFuture<'a, Result<String, ExecutorError>> {
        Box::pin(async move {
            let argv = build_argv(self.config.backend_for(&request.agent));
            let program = which::which(&argv[0])
                .map_err(|_| ExecutorError::NotFound(argv[0].clone()))?;

            tracing::debug!(agent = %request.agent, program = %program.display(), "spawning executor");

            let mut child = Command::new(&program)
                .args(&argv[1..])
                .current_dir(&request.project_root)
                .env("RELAY_AGENT", &request.agent)
                .env("RELAY_STAGE", request.stage.as_str())
                .env("RELAY_PROJECT", &request.project_root)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ExecutorError::Spawn {
                    program: argv[0].clone(),
                    source,
                })?;

            if let Some(mut stdin) = child.stdin.take() {
                let prompt = request.prompt.clone();
                // A child that exits without reading its stdin closes the
                // pipe; that is reported through the exit status instead.
                tokio::spawn(async move {
                    let _ = stdin.write_all(prompt.as_bytes()).await;
                    let _ = stdin.shutdown().await;
                });
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|source| ExecutorError::Spawn {
                    program: argv[0].clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(ExecutorError::Exit {
                    code: output.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            let text = String::from_utf8_lossy(&output.stdout).into_owned();
            if text.trim().is_empty() {
                return Err(ExecutorError::EmptyOutput);
            }
            Ok(text)
        })
    }

    fn timeout(&self, agent: &str) -> Option<Duration> {
        self.config.backend_for(agent).timeout()
    }
}
