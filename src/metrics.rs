//! Prometheus metrics for checks and alerts.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Counters and gauges updated by the scheduler.
pub struct Metrics {
    alert_count: IntCounterVec,
    check_count: IntCounterVec,
    monitor_status: IntGaugeVec,
    check_millis: IntGaugeVec,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let alert_count = IntCounterVec::new(
            Opts::new("minitor_alert_total", "Number of Minitor alerts"),
            &["alert", "monitor"],
        )?;
        registry.register(Box::new(alert_count.clone()))?;

        let check_count = IntCounterVec::new(
            Opts::new("minitor_check_total", "Number of Minitor checks"),
            &["monitor", "status", "is_alert"],
        )?;
        registry.register(Box::new(check_count.clone()))?;

        let monitor_status = IntGaugeVec::new(
            Opts::new(
                "minitor_monitor_up_count",
                "Status of currently responsive monitors",
            ),
            &["monitor"],
        )?;
        registry.register(Box::new(monitor_status.clone()))?;

        let check_millis = IntGaugeVec::new(
            Opts::new(
                "minitor_check_milliseconds",
                "Duration of the last check in milliseconds",
            ),
            &["monitor"],
        )?;
        registry.register(Box::new(check_millis.clone()))?;

        Ok(Self {
            alert_count,
            check_count,
            monitor_status,
            check_millis,
            registry,
        })
    }

    /// Set whether a monitor (or `"Alert <name>"`) is currently up.
    pub fn set_monitor_status(&self, monitor: &str, is_up: bool) {
        self.monitor_status
            .with_label_values(&[monitor])
            .set(i64::from(is_up));
    }

    /// Count a check result and record how long it took.
    pub fn count_check(&self, monitor: &str, is_success: bool, millis: u64, is_alert: bool) {
        let status = if is_success { "success" } else { "failure" };
        let alert = if is_alert { "true" } else { "false" };

        self.check_count
            .with_label_values(&[monitor, status, alert])
            .inc();
        self.check_millis
            .with_label_values(&[monitor])
            .set(i64::try_from(millis).unwrap_or(i64::MAX));
    }

    /// Count an alert that was sent successfully.
    pub fn count_alert(&self, monitor: &str, alert: &str) {
        self.alert_count.with_label_values(&[alert, monitor]).inc();
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
