//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;

// ============================================================================
// Metrics
// ============================================================================

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Any non-empty value reports monitor health instead of minitor's own.
    #[serde(default)]
    pub monitors: Option<String>,
}

pub async fn handle_health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    let (healthy, body) = match query.monitors.as_deref() {
        Some(value) if !value.is_empty() => state.health.monitors_health_check().await,
        _ => state.health.minitor_health_check(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, body)
}

// ============================================================================
// API: Monitors
// ============================================================================

pub async fn handle_get_monitors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.monitors().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use crate::metrics::Metrics;
    use crate::monitor::MonitorStatus;
    use std::sync::Arc;

    fn status(name: &str, is_up: bool) -> MonitorStatus {
        MonitorStatus {
            name: name.to_string(),
            is_up,
            failure_count: u32::from(!is_up),
            alert_count: u32::from(!is_up),
            last_check: None,
            last_success: None,
            last_check_ms: 3,
            last_output: "out\n".to_string(),
        }
    }

    fn state(monitors: Vec<MonitorStatus>) -> AppState {
        AppState {
            metrics: Arc::new(Metrics::new().unwrap()),
            health: Arc::new(HealthState::new(monitors)),
        }
    }

    fn monitors_query(value: &str) -> Query<HealthQuery> {
        Query(HealthQuery {
            monitors: Some(value.to_string()),
        })
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_minitor() {
        let state = state(Vec::new());

        let response = handle_health(State(state.clone()), Query(HealthQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(response).await, "UNHEALTHY");

        state.health.set_healthy(true);
        let response = handle_health(State(state), Query(HealthQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_health_monitors() {
        let state = state(vec![status("a", true), status("b", false)]);
        // Minitor's own health is independent
        state.health.set_healthy(true);

        let response = handle_health(State(state.clone()), monitors_query("1"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_text(response).await,
            "UNHEALTHY: The following monitors are unhealthy: b"
        );

        // Empty value falls back to minitor health
        let response = handle_health(State(state.clone()), monitors_query(""))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        state.health.update_monitor(status("b", true)).await;
        let response = handle_health(State(state), monitors_query("true"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_metrics() {
        let state = state(Vec::new());
        state.metrics.count_check("web", true, 5, false);

        let response = handle_metrics(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("minitor_check_total"));
    }

    #[tokio::test]
    async fn test_get_monitors() {
        let state = state(vec![status("a", true), status("b", false)]);

        let response = handle_get_monitors(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body[0]["name"], "a");
        assert_eq!(body[0]["is_up"], true);
        assert_eq!(body[1]["name"], "b");
        assert_eq!(body[1]["alert_count"], 1);
        assert_eq!(body[1]["last_output"], "out\n");
        assert!(body[1]["last_check"].is_null());
    }
}
