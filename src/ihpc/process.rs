//! External command execution with a hard timeout.
//!
//! [`ProcessRunner`] is the seam between the orchestration layer and the
//! operating system, so listing and network detection can be tested with a
//! scripted runner.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::IhpcError;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Exited with status 0 and wrote nothing to stderr.
    pub fn is_clean(&self) -> bool {
        self.exit_code == Some(0) && self.stderr.trim().is_empty()
    }
}

/// Trait for running external commands.
///
/// Implementations must be thread-safe (`Send + Sync`) and must not leave
/// the process running once `timeout` expires.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and collect its output.
    ///
    /// # Returns
    ///
    /// * `Ok(CommandOutput)` - The process finished, successfully or not
    /// * `Err(IhpcError::Spawn)` - The process could not be started
    /// * `Err(IhpcError::Timeout)` - The process was killed after `timeout`
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, IhpcError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, IhpcError> {
        let command_line = display_command(program, args);
        debug!("Running `{}` with timeout {:?}", command_line, timeout);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| IhpcError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| IhpcError::Spawn {
                command: command_line.clone(),
                source,
            })?,
            Err(_) => {
                warn!("`{}` timed out after {:?}, killed", command_line, timeout);
                return Err(IhpcError::Timeout {
                    command: command_line,
                    timeout,
                });
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Shell-like rendering of a command for logs and error messages.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        if arg.contains(char::is_whitespace) {
            rendered.push('"');
            rendered.push_str(arg);
            rendered.push('"');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}
