//! Minitor - a minimal monitoring tool.
//!
//! Runs check commands on an interval and runs alert commands when checks
//! start failing or recover.

mod alert;
mod command;
mod config;
mod health;
mod metrics;
mod monitor;
mod scheduler;
mod web;

use clap::Parser;
use config::{Config, ServerConfig};
use health::HealthState;
use metrics::Metrics;
use monitor::Monitor;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = ServerConfig::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(log_filter(cfg.debug)?)
        .init();

    // Load configuration
    let config = Config::load(&cfg.config).map_err(|e| {
        tracing::error!("Error loading config: {}", e);
        e
    })?;
    tracing::info!(
        "Loaded {} monitors and {} alerts from {}",
        config.monitors.len(),
        config.alerts.len(),
        cfg.config.display()
    );

    let metrics = Arc::new(Metrics::new()?);
    let health = Arc::new(HealthState::new(
        config.monitors.iter().map(Monitor::status).collect(),
    ));

    // Serve metrics and health checks, if enabled
    if cfg.serve_http() {
        if cfg.metrics {
            tracing::info!("Exporting metrics to Prometheus on port {}", cfg.metrics_port);
        }
        if cfg.self_monitor {
            tracing::info!("Starting healthcheck endpoint on port {}", cfg.metrics_port);
        }

        let server = Server::new(cfg.metrics_port, metrics.clone(), health.clone(), cfg.metrics);
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                tracing::error!("Web server failed: {}", e);
            }
        });
    }

    // Start main loop
    let scheduler = Scheduler::new(config, metrics, health, cfg.self_monitor);
    scheduler.run().await.map_err(|e| {
        tracing::error!("Error checking monitors: {}", e);
        e
    })?;

    Ok(())
}

/// `RUST_LOG` plus our own and the HTTP trace layer's events at the chosen
/// level.
fn log_filter(debug: bool) -> Result<EnvFilter, ParseError> {
    let level = if debug { "debug" } else { "info" };
    Ok(EnvFilter::from_default_env()
        .add_directive(format!("minitor={level}").parse()?)
        .add_directive(format!("tower_http={level}").parse()?))
}
