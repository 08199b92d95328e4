//! Delivery of alert notices to configured alerts.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::alert::{Alert, AlertError, AlertNotice};
use crate::metrics::Metrics;

/// Dispatch error types.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The alert passed validation but is missing from the lookup table.
    #[error("unknown alert for monitor {monitor}: {alert}")]
    UnknownAlert { monitor: String, alert: String },
    #[error(transparent)]
    Alert(#[from] AlertError),
}

/// Sends notices to alerts by name.
pub struct AlertDispatcher {
    alerts: Arc<HashMap<String, Alert>>,
    metrics: Arc<Metrics>,
}

impl AlertDispatcher {
    pub fn new(alerts: Arc<HashMap<String, Alert>>, metrics: Arc<Metrics>) -> Self {
        Self { alerts, metrics }
    }

    /// Send a notice to each named alert in order.
    ///
    /// Stops at the first alert that fails; later alerts are not sent.
    pub async fn send_alerts(
        &self,
        names: &[String],
        notice: &AlertNotice,
    ) -> Result<(), DispatchError> {
        tracing::debug!("Received an alert notice from {}", notice.monitor_name);

        if names.is_empty() {
            // Only expected for recoveries, alert_down is validated non-empty
            tracing::warn!(
                "Received alert, but no alert mechanisms exist. MonitorName={} IsUp={}",
                notice.monitor_name,
                notice.is_up
            );
            return Ok(());
        }

        for name in names {
            let Some(alert) = self.alerts.get(name) else {
                tracing::error!(
                    "Unknown alert for monitor {}: {}",
                    notice.monitor_name,
                    name
                );
                return Err(DispatchError::UnknownAlert {
                    monitor: notice.monitor_name.clone(),
                    alert: name.clone(),
                });
            };

            let status_name = format!("Alert {}", name);

            if let Err(e) = alert.send(notice).await {
                let output = match &e {
                    AlertError::Failed { output, .. } => output.as_str(),
                    _ => "",
                };
                tracing::error!(
                    "Alert '{}' failed. result={}: output={}",
                    alert.name(),
                    e,
                    output
                );
                self.metrics.set_monitor_status(&status_name, false);
                return Err(e.into());
            }

            self.metrics.set_monitor_status(&status_name, true);
            self.metrics.count_alert(&notice.monitor_name, name);
        }

        Ok(())
    }
}
