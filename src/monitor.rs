//! Monitors: periodic checks with failure tracking and alert cadence.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::AlertNotice;
use crate::command::CommandSpec;

/// Which qualifying failures produce an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertCadence {
    /// Only the failure that reaches `alert_after`.
    #[default]
    Once,
    /// Every n-th qualifying failure, starting with the first.
    Every(u32),
    /// Exponentially growing gaps between alerts.
    Backoff,
}

impl AlertCadence {
    /// Interpret an `alert_every` setting: unset or zero alerts once, positive
    /// values alert periodically and negative values back off.
    pub fn from_setting(alert_every: Option<i64>) -> Self {
        match alert_every {
            None | Some(0) => AlertCadence::Once,
            Some(n) if n > 0 => AlertCadence::Every(u32::try_from(n).unwrap_or(u32::MAX)),
            Some(_) => AlertCadence::Backoff,
        }
    }
}

/// Point-in-time view of a monitor for health and status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub name: String,
    pub is_up: bool,
    pub failure_count: u32,
    pub alert_count: u32,
    pub last_check: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_check_ms: u64,
    pub last_output: String,
}

/// A single configured check and its runtime state.
#[derive(Debug, Clone)]
pub struct Monitor {
    name: String,
    command: CommandSpec,
    check_interval: Duration,
    timeout: Duration,
    alert_after: u32,
    cadence: AlertCadence,
    alert_down: Vec<String>,
    alert_up: Vec<String>,

    failure_count: u32,
    alert_count: u32,
    checked_at: Option<Instant>,
    last_check: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_output: String,
    last_check_duration: Duration,
}

impl Monitor {
    /// Create a monitor that alerts on the first failure and has no alerts
    /// configured yet.
    pub fn new(name: &str, command: CommandSpec) -> Self {
        Self {
            name: name.to_string(),
            command,
            check_interval: Duration::ZERO,
            timeout: Duration::ZERO,
            alert_after: 1,
            cadence: AlertCadence::Once,
            alert_down: Vec::new(),
            alert_up: Vec::new(),
            failure_count: 0,
            alert_count: 0,
            checked_at: None,
            last_check: None,
            last_success: None,
            last_output: String::new(),
            last_check_duration: Duration::ZERO,
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Kill the check command after `timeout`. Zero disables the limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Minimum consecutive failures before alerting. Zero is raised to one.
    pub fn with_alert_after(mut self, alert_after: u32) -> Self {
        self.alert_after = alert_after.max(1);
        self
    }

    pub fn with_cadence(mut self, cadence: AlertCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_alerts(mut self, alert_down: Vec<String>, alert_up: Vec<String>) -> Self {
        self.alert_down = alert_down;
        self.alert_up = alert_up;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A monitor is up until it has sent a down alert.
    pub fn is_up(&self) -> bool {
        self.alert_count == 0
    }

    pub fn last_check_millis(&self) -> u64 {
        u64::try_from(self.last_check_duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Alert names to notify for a transition in the given direction.
    pub fn alert_names(&self, is_up: bool) -> &[String] {
        if is_up {
            &self.alert_up
        } else {
            &self.alert_down
        }
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            name: self.name.clone(),
            is_up: self.is_up(),
            failure_count: self.failure_count,
            alert_count: self.alert_count,
            last_check: self.last_check,
            last_success: self.last_success,
            last_check_ms: self.last_check_millis(),
            last_output: self.last_output.clone(),
        }
    }

    /// Whether the check interval has passed since the last check.
    pub fn should_check(&self) -> bool {
        match self.checked_at {
            None => true,
            Some(_) if self.check_interval.is_zero() => true,
            Some(at) => at.elapsed() >= self.check_interval,
        }
    }

    /// Run the check command and update state.
    ///
    /// Returns whether the check passed and the notice to send, if any.
    pub async fn check(&mut self) -> (bool, Option<AlertNotice>) {
        let started = Instant::now();
        let result = self.command.run(self.timeout).await;

        self.checked_at = Some(Instant::now());
        self.last_check = Some(Utc::now());
        self.last_check_duration = started.elapsed();

        let is_success = match result {
            Ok(out) => {
                let success = out.success();
                if !success {
                    tracing::warn!("Command result: {}", out.status);
                }
                self.last_output = out.output;
                success
            }
            Err(e) => {
                tracing::warn!("Command result: {}", e);
                self.last_output = String::new();
                false
            }
        };

        tracing::debug!("Command output: {}", self.last_output);

        let notice = if is_success {
            self.success()
        } else {
            self.failure()
        };

        tracing::info!(
            "{} success={}, alert={}",
            self.name,
            is_success,
            notice.is_some()
        );

        (is_success, notice)
    }

    /// Record a passing check. Returns a recovery notice if the monitor was
    /// down.
    pub fn success(&mut self) -> Option<AlertNotice> {
        let notice = (!self.is_up()).then(|| self.notice(true));

        self.failure_count = 0;
        self.alert_count = 0;
        self.last_success = Some(Utc::now());

        notice
    }

    /// Record a failing check. Returns a down notice if the cadence calls
    /// for one.
    pub fn failure(&mut self) -> Option<AlertNotice> {
        self.failure_count = self.failure_count.saturating_add(1);

        if self.failure_count < self.alert_after {
            tracing::debug!(
                "{} failed but did not hit minimum failures. Count: {} alert after: {}",
                self.name,
                self.failure_count,
                self.alert_after
            );
            return None;
        }

        // Failures past the threshold, zero on the one that reaches it
        let excess = self.failure_count - self.alert_after;

        let should_alert = match self.cadence {
            AlertCadence::Once => excess == 0,
            AlertCadence::Every(n) => excess % n.max(1) == 0,
            AlertCadence::Backoff => {
                let gap = 1u64
                    .checked_shl(self.alert_count)
                    .map_or(u64::MAX, |p| p - 1);
                u64::from(excess) >= gap
            }
        };

        if !should_alert {
            return None;
        }

        self.alert_count = self.alert_count.saturating_add(1);
        Some(self.notice(false))
    }

    fn notice(&self, is_up: bool) -> AlertNotice {
        AlertNotice {
            monitor_name: self.name.clone(),
            alert_count: self.alert_count,
            failure_count: self.failure_count,
            is_up,
            last_success: self.last_success,
            last_check_output: self.last_output.clone(),
        }
    }
}
