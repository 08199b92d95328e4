//! Web server module for metrics and health checks.

mod handlers;

pub use handlers::*;

use crate::health::HealthState;
use crate::metrics::Metrics;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub health: Arc<HealthState>,
}

/// Web server for metrics and health endpoints.
pub struct Server {
    state: AppState,
    port: u16,
    export_metrics: bool,
}

impl Server {
    /// Create a new server. `/metrics` is only routed when `export_metrics`
    /// is set.
    pub fn new(
        port: u16,
        metrics: Arc<Metrics>,
        health: Arc<HealthState>,
        export_metrics: bool,
    ) -> Self {
        Self {
            state: AppState { metrics, health },
            port,
            export_metrics,
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(handlers::handle_health))
            .route("/api/monitors", get(handlers::handle_get_monitors));

        if self.export_metrics {
            router = router.route("/metrics", get(handlers::handle_metrics));
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
