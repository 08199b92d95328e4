//! Scheduler module for running checks and dispatching alerts.

mod dispatch;

pub use dispatch::*;

use crate::config::Config;
use crate::health::HealthState;
use crate::metrics::Metrics;
use crate::monitor::Monitor;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs every monitor in turn and routes their notices to alerts.
pub struct Scheduler {
    monitors: Vec<Monitor>,
    dispatcher: AlertDispatcher,
    metrics: Arc<Metrics>,
    health: Arc<HealthState>,
    check_interval: Duration,
    self_monitor: bool,
}

impl Scheduler {
    /// Create a scheduler that owns the configured monitors.
    ///
    /// With `self_monitor` set, alert failures mark minitor unhealthy instead
    /// of stopping the scheduler.
    pub fn new(
        config: Config,
        metrics: Arc<Metrics>,
        health: Arc<HealthState>,
        self_monitor: bool,
    ) -> Self {
        let dispatcher = AlertDispatcher::new(Arc::new(config.alerts), metrics.clone());

        Self {
            monitors: config.monitors,
            dispatcher,
            metrics,
            health,
            check_interval: config.check_interval,
            self_monitor,
        }
    }

    /// Check every monitor that is due and send any resulting alerts.
    pub async fn check_monitors(&mut self) -> Result<(), DispatchError> {
        let mut healthy = true;

        for monitor in self.monitors.iter_mut() {
            if !monitor.should_check() {
                continue;
            }

            let (success, notice) = monitor.check().await;

            self.metrics.set_monitor_status(monitor.name(), monitor.is_up());
            self.metrics.count_check(
                monitor.name(),
                success,
                monitor.last_check_millis(),
                notice.is_some(),
            );
            self.health.update_monitor(monitor.status()).await;

            let Some(notice) = notice else {
                continue;
            };

            let names = monitor.alert_names(notice.is_up);
            match self.dispatcher.send_alerts(names, &notice).await {
                Ok(()) => {}
                Err(e @ DispatchError::UnknownAlert { .. }) => return Err(e),
                Err(e) if self.self_monitor => {
                    tracing::warn!("Marking minitor unhealthy: {}", e);
                    healthy = false;
                }
                Err(e) => return Err(e),
            }
        }

        self.health.set_healthy(healthy);
        Ok(())
    }

    /// Check monitors until interrupted by Ctrl-C, pausing `check_interval`
    /// between passes.
    pub async fn run(self) -> Result<(), DispatchError> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Check monitors until `shutdown` completes. A pass in progress is
    /// abandoned, killing any running command.
    pub async fn run_until<F: Future>(mut self, shutdown: F) -> Result<(), DispatchError> {
        tracing::info!("Starting scheduler with {} monitors", self.monitors.len());

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = self.check_monitors() => result?,
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }

        tracing::info!("Scheduler: interrupted, stopping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Alert, AlertError};
    use crate::command::CommandSpec;
    use std::collections::HashMap;
    use std::path::Path;
    use tokio_test::{assert_err, assert_ok};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn shell(script: &str) -> CommandSpec {
        CommandSpec::Shell(script.to_string())
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    /// `log` appends the notice message to `path`, `broken` always fails.
    fn alerts(path: &Path) -> HashMap<String, Alert> {
        let script = format!("echo '{{{{alert_message}}}}' >> {}", path.display());
        HashMap::from([
            ("log".to_string(), Alert::new("log", &shell(&script), TIMEOUT).unwrap()),
            ("broken".to_string(), Alert::new("broken", &shell("exit 1"), TIMEOUT).unwrap()),
        ])
    }

    fn scheduler(
        monitors: Vec<Monitor>,
        path: &Path,
        self_monitor: bool,
    ) -> (Scheduler, Arc<HealthState>) {
        let health = Arc::new(HealthState::new(monitors.iter().map(Monitor::status).collect()));
        let config = Config {
            check_interval: Duration::from_secs(1),
            monitors,
            alerts: alerts(path),
        };
        let metrics = Arc::new(Metrics::new().unwrap());
        (Scheduler::new(config, metrics, health.clone(), self_monitor), health)
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_failure_and_recovery_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let flag = dir.path().join("up");

        // Passes once the flag file exists
        let check = format!("test -f {}", flag.display());
        let monitor = Monitor::new("flaky", shell(&check))
            .with_alerts(names(&["log"]), names(&["log"]));
        let (mut scheduler, health) = scheduler(vec![monitor], &log, false);

        assert_ok!(scheduler.check_monitors().await);
        assert_eq!(read(&log), "flaky check has failed 1 times\n");
        assert!(health.is_healthy());
        assert!(!health.monitors_health_check().await.0);

        // Already alerted once, no repeat
        assert_ok!(scheduler.check_monitors().await);
        assert_eq!(read(&log), "flaky check has failed 1 times\n");

        std::fs::write(&flag, "").unwrap();
        assert_ok!(scheduler.check_monitors().await);
        assert_eq!(
            read(&log),
            "flaky check has failed 1 times\nflaky has recovered\n"
        );
        assert!(health.monitors_health_check().await.0);
        assert!(scheduler.monitors[0].is_up());
    }

    #[tokio::test]
    async fn test_recovery_without_alert_up() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let flag = dir.path().join("up");

        let check = format!("test -f {}", flag.display());
        let monitor = Monitor::new("m", shell(&check)).with_alerts(names(&["log"]), Vec::new());
        let (mut scheduler, _) = scheduler(vec![monitor], &log, false);

        assert_ok!(scheduler.check_monitors().await);
        std::fs::write(&flag, "").unwrap();
        assert_ok!(scheduler.check_monitors().await);

        assert_eq!(read(&log), "m check has failed 1 times\n");
    }

    #[tokio::test]
    async fn test_alert_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");

        let monitors = vec![
            Monitor::new("first", shell("false"))
                .with_alerts(names(&["broken", "log"]), Vec::new()),
            Monitor::new("second", shell("false")).with_alerts(names(&["log"]), Vec::new()),
        ];
        let (mut scheduler, health) = scheduler(monitors, &log, false);

        let err = assert_err!(scheduler.check_monitors().await);
        assert!(matches!(err, DispatchError::Alert(AlertError::Failed { .. })));

        // Stopped before the second monitor ran
        assert_eq!(read(&log), "");
        assert!(scheduler.monitors[1].status().last_check.is_none());
        assert!(!health.is_healthy());
    }

    #[tokio::test]
    async fn test_alert_failure_self_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");

        let monitors = vec![
            Monitor::new("first", shell("false"))
                .with_alerts(names(&["broken", "log"]), Vec::new()),
            Monitor::new("second", shell("false")).with_alerts(names(&["log"]), Vec::new()),
        ];
        let (mut scheduler, health) = scheduler(monitors, &log, true);

        assert_ok!(scheduler.check_monitors().await);
        assert!(!health.is_healthy());
        assert_eq!(read(&log), "second check has failed 1 times\n");

        // A clean pass restores health
        assert_ok!(scheduler.check_monitors().await);
        assert!(health.is_healthy());
    }

    #[tokio::test]
    async fn test_unknown_alert_is_fatal_in_self_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");

        let monitors =
            vec![Monitor::new("m", shell("false")).with_alerts(names(&["missing"]), Vec::new())];
        let (mut scheduler, _) = scheduler(monitors, &log, true);

        let err = assert_err!(scheduler.check_monitors().await);
        assert!(matches!(err, DispatchError::UnknownAlert { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_during_check() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");

        let monitors =
            vec![Monitor::new("slow", shell("sleep 5")).with_alerts(names(&["log"]), Vec::new())];
        let (scheduler, _) = scheduler(monitors, &log, false);

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        let run = scheduler.run_until(shutdown);
        let result = tokio::time::timeout(Duration::from_secs(2), run);
        assert_ok!(assert_ok!(result.await));
        assert_eq!(read(&log), "");
    }

    #[tokio::test]
    async fn test_shutdown_between_passes() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let count = dir.path().join("count");

        let check = format!("echo x >> {}", count.display());
        let monitors = vec![Monitor::new("quick", shell(&check))
            .with_alerts(names(&["log"]), Vec::new())];
        let (mut scheduler, _) = scheduler(monitors, &log, false);
        scheduler.check_interval = Duration::from_secs(3600);

        // Fires after the first pass, while the scheduler sleeps
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = tx.send(());
        });

        let run = scheduler.run_until(rx);
        let result = tokio::time::timeout(Duration::from_secs(2), run);
        assert_ok!(assert_ok!(result.await));
        assert_eq!(read(&count), "x\n");
    }

    #[tokio::test]
    async fn test_skips_monitors_not_due() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let count = dir.path().join("count");

        let check = format!("echo x >> {}", count.display());
        let monitors = vec![Monitor::new("slow", shell(&check))
            .with_check_interval(Duration::from_secs(3600))
            .with_alerts(names(&["log"]), Vec::new())];
        let (mut scheduler, _) = scheduler(monitors, &log, false);

        assert_ok!(scheduler.check_monitors().await);
        assert_ok!(scheduler.check_monitors().await);
        assert_eq!(read(&count), "x\n");
    }
}
