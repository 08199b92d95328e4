//! Command execution for checks and alerts.
//!
//! A command is either an argument vector run directly or a string handed to
//! `sh -c`. Stdout and stderr share one pipe, so the collected output keeps
//! the order in which the command wrote it.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::Command;

/// Command error types.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to collect command output: {0}")]
    Wait(#[source] std::io::Error),
}

/// A configured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Program followed by its arguments.
    Args(Vec<String>),
    /// Script passed through `sh -c`.
    Shell(String),
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Interleaved stdout and stderr.
    pub output: String,
    pub status: ExitStatus,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

impl CommandSpec {
    /// Build a command from the two optional config fields.
    ///
    /// Returns `None` unless exactly one of them is set. An empty argument
    /// vector or blank shell string counts as unset.
    pub fn from_parts(command: Option<&[String]>, shell_command: Option<&str>) -> Option<Self> {
        let command = command.filter(|c| !c.is_empty());
        let shell_command = shell_command.filter(|s| !s.trim().is_empty());

        match (command, shell_command) {
            (Some(args), None) => Some(CommandSpec::Args(args.to_vec())),
            (None, Some(script)) => Some(CommandSpec::Shell(script.to_string())),
            _ => None,
        }
    }

    /// Name of the program that will be executed.
    pub fn program(&self) -> &str {
        match self {
            CommandSpec::Args(args) => args.first().map(String::as_str).unwrap_or_default(),
            CommandSpec::Shell(_) => "sh",
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = match self {
            CommandSpec::Args(args) => {
                let mut cmd = Command::new(self.program());
                cmd.args(args.iter().skip(1));
                cmd
            }
            CommandSpec::Shell(script) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script.trim());
                cmd
            }
        };

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run the command and wait for it to exit.
    ///
    /// A zero `timeout` waits indefinitely. On timeout the child is killed.
    pub async fn run(&self, timeout: Duration) -> Result<CommandOutput, CommandError> {
        tracing::debug!("Command: {:?}", self);

        let spawn_error = |e| CommandError::Spawn {
            program: self.program().to_string(),
            source: e,
        };

        let (reader, writer) = std::io::pipe().map_err(spawn_error)?;
        let mut cmd = self.to_command();
        cmd.stdout(writer.try_clone().map_err(spawn_error)?)
            .stderr(writer);

        let mut child = cmd.spawn().map_err(spawn_error)?;
        // Close our copies of the write end so the reader sees EOF
        drop(cmd);

        let mut reader =
            pipe::Receiver::from_owned_fd(reader.into()).map_err(CommandError::Wait)?;

        let collect = async {
            let mut output = Vec::new();
            reader.read_to_end(&mut output).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((output, status))
        };

        let result = if timeout.is_zero() {
            collect.await
        } else {
            tokio::time::timeout(timeout, collect)
                .await
                .map_err(|_| CommandError::Timeout(timeout))?
        };
        let (output, status) = result.map_err(CommandError::Wait)?;

        Ok(CommandOutput {
            output: String::from_utf8_lossy(&output).into_owned(),
            status,
        })
    }
}
