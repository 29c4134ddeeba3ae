//! Command-line agent generator.
//!
//! Runs any CLI agent that reads a prompt on stdin (or as a trailing
//! argument) and prints the commit message on stdout.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{GenerationTask, Generator};
use crate::error::GeneratorError;

/// Default per-attempt wall-clock limit.
pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(120);

/// Characters of stderr kept in error messages.
const STDERR_PREVIEW_CHARS: usize = 300;

/// Generator backed by a CLI agent process.
#[derive(Debug, Clone)]
pub struct CliGenerator {
    name: String,
    /// Base command to run.
    command: String,
    args: Vec<String>,
    /// Whether to pass the prompt via stdin (true) or as the last argument (false).
    use_stdin: bool,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
}

impl CliGenerator {
    /// Creates a generator running `command` with the prompt on stdin.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: command.clone(),
            command,
            args: Vec::new(),
            use_stdin: true,
            timeout: DEFAULT_CLI_TIMEOUT,
            working_dir: None,
            env_vars: Vec::new(),
        }
    }

    /// Claude Code in non-interactive print mode.
    pub fn claude() -> Self {
        Self::new("claude").with_args(vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
        ])
    }

    /// Codex CLI in exec mode, reading the prompt from stdin.
    pub fn codex() -> Self {
        Self::new("codex").with_args(vec!["exec".to_string(), "-".to_string()])
    }

    /// Split a whitespace-separated command line into command and arguments.
    ///
    /// Returns `None` for a blank command line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?;
        Some(Self::new(command).with_args(parts.map(str::to_string).collect()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_stdin(mut self, use_stdin: bool) -> Self {
        self.use_stdin = use_stdin;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the agent inside `dir`, typically the repository the diff came from.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether `<command> --version` runs successfully.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Generator for CliGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, task: &GenerationTask) -> Result<String, GeneratorError> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        if self.use_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
            cmd.arg(&task.prompt);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        info!(
            agent = %self.name,
            fixture = %task.fixture,
            attempt = task.attempt_number,
            "Starting CLI agent: {}",
            self.command
        );

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                GeneratorError::Unavailable(format!("Failed to spawn {}: {}", self.command, e))
            }
            _ => GeneratorError::ExecutionFailed(format!("Failed to spawn {}: {}", self.command, e)),
        })?;

        let stdin = if self.use_stdin { child.stdin.take() } else { None };
        let prompt = task.prompt.as_bytes();
        let command = self.command.as_str();

        // The timeout covers feeding the prompt too: an agent that never reads
        // stdin blocks the write once the pipe buffer is full.
        let run = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(prompt).await {
                    Ok(()) => {
                        stdin.shutdown().await.ok();
                    }
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        debug!(command = command, "Agent closed stdin before reading the full prompt");
                    }
                    Err(e) => {
                        return Err(GeneratorError::ExecutionFailed(format!(
                            "Failed to write prompt: {}",
                            e
                        )));
                    }
                }
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| GeneratorError::ExecutionFailed(format!("Process error: {}", e)))
        };

        // Dropping the pending future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GeneratorError::Timeout {
                    seconds: self.timeout.as_secs().max(1),
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            agent = %self.name,
            exit_code = exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "CLI agent finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let preview: String = stderr.trim().chars().take(STDERR_PREVIEW_CHARS).collect();
            return Err(GeneratorError::ExecutionFailed(format!(
                "{} exited with code {}: {}",
                self.command, exit_code, preview
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(GeneratorError::EmptyOutput);
        }
        Ok(stdout)
    }
}
