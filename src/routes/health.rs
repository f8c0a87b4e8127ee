// ============================================================================
// Health and Metrics Routes
// ============================================================================
//
// Endpoints:
// - GET /health - Liveness
// - GET /health/ready - Readiness (Shared Token Store reachable)
// - GET /metrics - Prometheus metrics
//
// ============================================================================

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::gateway::GatewayState;

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /health/ready
/// 503 while the Shared Token Store is unreachable, since every protected
/// request would fail closed
pub async fn readiness_check(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let timeout = Duration::from_millis(state.config.gateway.store_timeout_ms);

    match tokio::time::timeout(timeout, state.store.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy" })),
            )
        }
        Err(_) => {
            tracing::error!("Readiness check timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy" })),
            )
        }
    }
}

/// GET /metrics
/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match gatekeeper_metrics::gather_metrics() {
        Ok(metrics_data) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            metrics_data,
        ),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain")],
                "Internal Server Error".to_string(),
            )
        }
    }
}
