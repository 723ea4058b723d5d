//! Health and metrics HTTP sidecar.
//!
//! A small axum router next to the stdio MCP transport: liveness and
//! readiness probes for orchestration, the full health report, and the
//! Prometheus metrics exposition.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use qolaba_mcp_core::{HealthService, MetricsCollector};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<HealthService>,
    pub metrics: Arc<MetricsCollector>,
}

/// Build the sidecar router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the sidecar until the process exits.
pub async fn serve(state: AppState, address: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %address, "health/metrics server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.status().await;
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    for component in &report.components {
        state.metrics.record_health_check(
            &component.name,
            component.status == qolaba_mcp_core::HealthStatus::Healthy,
        );
    }
    (code, Json(serde_json::to_value(&report).unwrap_or_default()))
}

async fn live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "alive"}))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.status().await;
    if report.is_healthy() {
        (StatusCode::OK, Json(serde_json::json!({"ready": true})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ready": false, "status": report.status.as_str()})),
        )
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_builds() {
        let state = AppState {
            health: Arc::new(HealthService::new()),
            metrics: Arc::new(MetricsCollector::new()),
        };
        let _router = router(state);
    }
}
