//! Configuration for minitor.
//!
//! Runtime flags come from the command line or `MINITOR_*` environment
//! variables. Monitors and alerts are loaded from a YAML file.

mod duration;
mod file;

pub use duration::*;
pub use file::*;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::alert::Alert;
use crate::monitor::{AlertCadence, Monitor};

/// Timeout for check and alert commands when the file does not set one.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Config error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse {context}: {source}")]
    Duration {
        context: String,
        #[source]
        source: DurationError,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Runtime flags.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "minitor", version, about = "A minimal monitoring tool")]
pub struct ServerConfig {
    /// Path to the monitor config file
    #[arg(long, env = "MINITOR_CONFIG", default_value = "config.yml")]
    pub config: PathBuf,
    /// Enable debug logs
    #[arg(long, env = "MINITOR_DEBUG")]
    pub debug: bool,
    /// Export Prometheus metrics
    #[arg(long, env = "MINITOR_METRICS")]
    pub metrics: bool,
    /// Port for metrics and health checks
    #[arg(long, env = "MINITOR_METRICS_PORT", default_value_t = 8080)]
    pub metrics_port: u16,
    /// Report alert failures on the health endpoint instead of exiting
    #[arg(long, env = "MINITOR_SELF_MONITOR")]
    pub self_monitor: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.yml"),
            debug: false,
            metrics: false,
            metrics_port: 8080,
            self_monitor: false,
        }
    }
}

impl ServerConfig {
    /// Whether the HTTP server is needed at all.
    pub fn serve_http(&self) -> bool {
        self.metrics || self.self_monitor
    }
}

/// Validated monitors and alerts, ready for the scheduler.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pause between passes over the monitors.
    pub check_interval: Duration,
    pub monitors: Vec<Monitor>,
    pub alerts: HashMap<String, Alert>,
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(text)?;
        Self::from_file(file)
    }

    /// Apply defaults and validate. Every problem found is reported.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let check_interval = parse_field(&file.check_interval, "top level check_interval")?;
        let command_timeout = match &file.command_timeout {
            Some(value) => parse_field(value, "command_timeout")?,
            None => DEFAULT_COMMAND_TIMEOUT,
        };
        let default_alert_after = file.default_alert_after.max(1);

        let mut problems = Vec::new();

        if file.alerts.is_empty() {
            problems.push("no alerts provided".to_string());
        }

        let mut alerts = HashMap::new();
        for (name, alert) in &file.alerts {
            if !alert.is_valid() {
                problems.push(format!(
                    "invalid alert configuration: {} must have exactly one of command or shell_command",
                    name
                ));
                continue;
            }

            let timeout = match &alert.timeout {
                Some(value) => parse_field(value, &format!("timeout for alert {}", name))?,
                None => command_timeout,
            };

            if let Some(spec) = alert.command_spec() {
                match Alert::new(name, &spec, timeout) {
                    Ok(alert) => {
                        alerts.insert(name.clone(), alert);
                    }
                    Err(e) => problems.push(e.to_string()),
                }
            }
        }

        if file.monitors.is_empty() {
            problems.push("no monitors provided".to_string());
        }

        let mut seen = BTreeSet::new();
        let mut monitors = Vec::with_capacity(file.monitors.len());

        for mut cfg in file.monitors {
            cfg.apply_defaults(
                default_alert_after,
                file.default_alert_every,
                &file.default_alert_down,
                &file.default_alert_up,
            );

            let mut monitor_problems = cfg.validate();

            if !seen.insert(cfg.name.clone()) {
                monitor_problems.push(format!("monitor {} is defined more than once", cfg.name));
            }

            for alert_name in cfg.alert_down.iter().chain(&cfg.alert_up) {
                if !file.alerts.contains_key(alert_name) {
                    monitor_problems.push(format!(
                        "monitor {} references unknown alert {}",
                        cfg.name, alert_name
                    ));
                }
            }

            let check_interval = match &cfg.check_interval {
                Some(value) => {
                    parse_field(value, &format!("check_interval for monitor {}", cfg.name))?
                }
                None => Duration::ZERO,
            };
            let timeout = match &cfg.timeout {
                Some(value) => parse_field(value, &format!("timeout for monitor {}", cfg.name))?,
                None => command_timeout,
            };

            if !monitor_problems.is_empty() {
                problems.extend(monitor_problems);
                continue;
            }

            let Some(command) = cfg.command_spec() else {
                continue;
            };

            let monitor = Monitor::new(&cfg.name, command)
                .with_check_interval(check_interval)
                .with_timeout(timeout)
                .with_alert_after(u32::try_from(cfg.alert_after).unwrap_or(u32::MAX))
                .with_cadence(AlertCadence::from_setting(cfg.alert_every))
                .with_alerts(cfg.alert_down, cfg.alert_up);
            monitors.push(monitor);
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(Self {
            check_interval,
            monitors,
            alerts,
        })
    }
}

fn parse_field(value: &DurationValue, context: &str) -> Result<Duration, ConfigError> {
    value.to_duration().map_err(|e| ConfigError::Duration {
        context: context.to_string(),
        source: e,
    })
}
