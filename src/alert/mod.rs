//! Alerts: named commands run when a monitor goes down or recovers.

mod template;

pub use template::*;

use std::process::ExitStatus;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::command::{CommandError, CommandSpec};

/// Alert error types.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("invalid template for alert {alert}: {source}")]
    Template {
        alert: String,
        #[source]
        source: TemplateError,
    },
    #[error("alert '{alert}' failed to send. Returned {status}")]
    Failed {
        alert: String,
        status: ExitStatus,
        output: String,
    },
    #[error("alert '{alert}' failed to send: {source}")]
    Command {
        alert: String,
        #[source]
        source: CommandError,
    },
}

/// Snapshot of a monitor transition handed to an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertNotice {
    pub monitor_name: String,
    pub alert_count: u32,
    pub failure_count: u32,
    pub is_up: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_check_output: String,
}

impl AlertNotice {
    /// Human readable summary of the transition.
    pub fn message(&self) -> String {
        if self.is_up {
            format!("{} has recovered", self.monitor_name)
        } else {
            format!(
                "{} check has failed {} times",
                self.monitor_name, self.failure_count
            )
        }
    }
}

#[derive(Debug, Clone)]
enum CommandTemplate {
    Args(Vec<Template>),
    Shell(Template),
}

/// A configured alert with compiled command templates.
#[derive(Debug, Clone)]
pub struct Alert {
    name: String,
    command: CommandTemplate,
    timeout: Duration,
}

impl Alert {
    /// Compile an alert from its command spec.
    pub fn new(name: &str, command: &CommandSpec, timeout: Duration) -> Result<Self, AlertError> {
        tracing::debug!("Building template for alert {}", name);

        let compile = |source: &str| {
            Template::compile(source).map_err(|e| AlertError::Template {
                alert: name.to_string(),
                source: e,
            })
        };

        let command = match command {
            CommandSpec::Args(parts) => CommandTemplate::Args(
                parts
                    .iter()
                    .map(|part| compile(part))
                    .collect::<Result<_, _>>()?,
            ),
            CommandSpec::Shell(script) => CommandTemplate::Shell(compile(script)?),
        };

        Ok(Self {
            name: name.to_string(),
            command,
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the command for a notice.
    pub fn render(&self, notice: &AlertNotice) -> CommandSpec {
        match &self.command {
            CommandTemplate::Args(parts) => {
                CommandSpec::Args(parts.iter().map(|t| t.render(notice)).collect())
            }
            CommandTemplate::Shell(t) => CommandSpec::Shell(t.render(notice)),
        }
    }

    /// Send a notice by running the rendered command.
    ///
    /// Returns the combined output of the command.
    pub async fn send(&self, notice: &AlertNotice) -> Result<String, AlertError> {
        tracing::info!("Sending alert {} for {}", self.name, notice.monitor_name);

        let result = self
            .render(notice)
            .run(self.timeout)
            .await
            .map_err(|e| AlertError::Command {
                alert: self.name.clone(),
                source: e,
            })?;

        tracing::debug!(
            "Alert output for: {}\n---\n{}\n---",
            self.name,
            result.output
        );

        if !result.success() {
            return Err(AlertError::Failed {
                alert: self.name.clone(),
                status: result.status,
                output: result.output,
            });
        }

        Ok(result.output)
    }
}
