//! SafeCommandExecutor: whitelisted, shell-free execution of registry tooling
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only `docker` can execute
//! - **Injection prevention**: Arguments are passed as a vector, never interpolated into a shell string
//! - **Secret handling**: Credentials travel through stdin, never through argv
//! - **Working directory validation**: Validates existence before execution
//!
//! # Example
//!
//! ```rust,no_run
//! use plugin_publisher::security::{CommandRunner, SafeCommandExecutor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! let output = executor.run("docker", &["--version".to_string()], None).await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use crate::security::token_manager::SecureTokenManager;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Allowed commands whitelist.
const ALLOWED_COMMANDS: &[&str] = &["docker"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be started (binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Short failure description for error messages
    pub fn failure_message(&self) -> String {
        let code = self
            .status
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit status {}", code)
        } else {
            format!("exit status {}: {}", code, stderr)
        }
    }
}

/// Runs external commands on behalf of the orchestrator
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `args`, writing `stdin` to the child when given.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`CommandOutput::success`].
    async fn run(
        &self,
        command: &str,
        args: &[String],
        stdin: Option<&SecretString>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Scrubs known tokens from streamed output
    masker: SecureTokenManager,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            masker: SecureTokenManager::default(),
        })
    }

    /// Mask these tokens in every line of command output
    pub fn with_masking(mut self, masker: SecureTokenManager) -> Self {
        self.masker = masker;
        self
    }
}

/// Forward each line of `reader` to the log as it arrives and collect the
/// masked text
async fn stream_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    masker: &SecureTokenManager,
    command: &str,
    stream: &'static str,
) -> String {
    let mut collected = String::new();
    let Some(reader) = reader else {
        return collected;
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = masker.mask_tokens_in_string(&line);
        tracing::info!(command, stream, "{}", line);
        collected.push_str(&line);
        collected.push('\n');
    }

    collected
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        stdin: Option<&SecretString>,
    ) -> Result<CommandOutput, CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        let mut child = Command::new(command)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        if let Some(secret) = stdin {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                CommandError::ExecutionFailed("stdin of child process unavailable".to_string())
            })?;
            pipe.write_all(secret.expose_secret().as_bytes())
                .await
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
            // Closing stdin lets `--password-stdin` finish reading
            drop(pipe);
        }

        let (stdout, stderr) = tokio::join!(
            stream_lines(child.stdout.take(), &self.masker, command, "stdout"),
            stream_lines(child.stderr.take(), &self.masker, command, "stderr"),
        );

        let status = child
            .wait()
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        Ok(CommandOutput {
            status: status.code(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let args = vec!["-rf".to_string(), "/".to_string()];
        let result = executor.run("rm", &args, None).await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[tokio::test]
    async fn test_rejected_command_sh() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let args = vec!["-c".to_string(), "docker push x".to_string()];
        let result = executor.run("sh", &args, None).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(_))));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }

    #[test]
    fn test_failure_message_includes_stderr() {
        let output = CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: "denied: requested access to the resource is denied\n".to_string(),
        };

        assert!(!output.success());
        assert_eq!(
            output.failure_message(),
            "exit status 1: denied: requested access to the resource is denied"
        );
    }

    #[test]
    fn test_failure_message_killed() {
        let output = CommandOutput {
            status: None,
            stdout: String::new(),
            stderr: String::new(),
        };

        assert_eq!(output.failure_message(), "exit status signal");
    }

    #[tokio::test]
    async fn test_stream_lines_masks_and_collects() {
        let env = std::collections::HashMap::from([(
            "CI_JOB_TOKEN".to_string(),
            "job-token-0123456789".to_string(),
        )]);
        let masker = SecureTokenManager::from_env(&env);
        let output: &[u8] = b"#1 [internal] load build definition\nauth job-token-0123456789\n";

        let collected = stream_lines(Some(output), &masker, "docker", "stdout").await;
        assert_eq!(
            collected,
            "#1 [internal] load build definition\nauth job...789\n"
        );
    }

    #[tokio::test]
    async fn test_stream_lines_without_pipe() {
        let masker = SecureTokenManager::default();
        let collected = stream_lines(None::<&[u8]>, &masker, "docker", "stderr").await;
        assert!(collected.is_empty());
    }
}
