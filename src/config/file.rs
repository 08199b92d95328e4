//! On-disk layout of the monitor config file.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::duration::DurationValue;
use crate::command::CommandSpec;

/// Top level of the YAML config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub check_interval: DurationValue,
    #[serde(default)]
    pub command_timeout: Option<DurationValue>,
    #[serde(default)]
    pub default_alert_after: i64,
    #[serde(default)]
    pub default_alert_every: Option<i64>,
    #[serde(default)]
    pub default_alert_down: Vec<String>,
    #[serde(default)]
    pub default_alert_up: Vec<String>,
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
    #[serde(default)]
    pub alerts: BTreeMap<String, AlertConfig>,
}

/// A `monitors` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub name: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub shell_command: Option<String>,
    #[serde(default)]
    pub check_interval: Option<DurationValue>,
    #[serde(default)]
    pub timeout: Option<DurationValue>,
    #[serde(default)]
    pub alert_after: i64,
    #[serde(default)]
    pub alert_every: Option<i64>,
    #[serde(default)]
    pub alert_down: Vec<String>,
    #[serde(default)]
    pub alert_up: Vec<String>,
}

/// An `alerts` entry, keyed by alert name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub shell_command: Option<String>,
    #[serde(default)]
    pub timeout: Option<DurationValue>,
}

impl AlertConfig {
    pub fn command_spec(&self) -> Option<CommandSpec> {
        CommandSpec::from_parts(self.command.as_deref(), self.shell_command.as_deref())
    }

    /// Exactly one of `command` or `shell_command` is set.
    pub fn is_valid(&self) -> bool {
        self.command_spec().is_some()
    }
}

impl MonitorConfig {
    pub fn command_spec(&self) -> Option<CommandSpec> {
        CommandSpec::from_parts(self.command.as_deref(), self.shell_command.as_deref())
    }

    /// Fill unset alert settings from the file-wide defaults.
    pub fn apply_defaults(
        &mut self,
        alert_after: i64,
        alert_every: Option<i64>,
        alert_down: &[String],
        alert_up: &[String],
    ) {
        if self.alert_after == 0 {
            self.alert_after = alert_after.max(1);
        }

        if self.alert_every.is_none() {
            self.alert_every = alert_every;
        }

        if self.alert_down.is_empty() {
            self.alert_down = alert_down.to_vec();
        }

        if self.alert_up.is_empty() {
            self.alert_up = alert_up.to_vec();
        }
    }

    /// Problems with this monitor's own settings. Run after
    /// [`apply_defaults`](Self::apply_defaults).
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let has_command = self.command.as_ref().is_some_and(|c| !c.is_empty());
        let has_shell_command = self
            .shell_command
            .as_ref()
            .is_some_and(|s| !s.trim().is_empty());

        if !has_command && !has_shell_command {
            problems.push(format!(
                "monitor {} has no command or shell_command configured",
                self.name
            ));
        }

        if has_command && has_shell_command {
            problems.push(format!(
                "monitor {} has both command and shell_command configured",
                self.name
            ));
        }

        if self.alert_after <= 0 {
            problems.push(format!(
                "monitor {} has invalid alert_after value {}. Must be greater than 0",
                self.name, self.alert_after
            ));
        }

        if self.alert_down.is_empty() {
            problems.push(format!(
                "monitor {} has no alert_down configured. Configure one here or add a default_alert_down",
                self.name
            ));
        }

        problems
    }
}
