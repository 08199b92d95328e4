//! Health of minitor itself and of its monitors.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::monitor::MonitorStatus;

/// Shared between the scheduler, which writes after every check, and the
/// HTTP handlers.
pub struct HealthState {
    healthy: AtomicBool,
    monitors: RwLock<Vec<MonitorStatus>>,
}

impl HealthState {
    /// Starts unhealthy until the first pass over the monitors completes.
    pub fn new(monitors: Vec<MonitorStatus>) -> Self {
        Self {
            healthy: AtomicBool::new(false),
            monitors: RwLock::new(monitors),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Replace the stored status for a monitor, adding it if unknown.
    pub async fn update_monitor(&self, status: MonitorStatus) {
        let mut monitors = self.monitors.write().await;
        match monitors.iter_mut().find(|m| m.name == status.name) {
            Some(existing) => *existing = status,
            None => monitors.push(status),
        }
    }

    pub async fn monitors(&self) -> Vec<MonitorStatus> {
        self.monitors.read().await.clone()
    }

    /// Whether minitor itself is healthy, with a response body.
    pub fn minitor_health_check(&self) -> (bool, String) {
        if self.is_healthy() {
            (true, "OK".to_string())
        } else {
            (false, "UNHEALTHY".to_string())
        }
    }

    /// Whether every monitor is up, with a response body naming those that
    /// are not.
    pub async fn monitors_health_check(&self) -> (bool, String) {
        let monitors = self.monitors.read().await;
        let down: Vec<&str> = monitors
            .iter()
            .filter(|m| !m.is_up)
            .map(|m| m.name.as_str())
            .collect();

        if down.is_empty() {
            (true, "OK".to_string())
        } else {
            (
                false,
                format!(
                    "UNHEALTHY: The following monitors are unhealthy: {}",
                    down.join(", ")
                ),
            )
        }
    }
}
