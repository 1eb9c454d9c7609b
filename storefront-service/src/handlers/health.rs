//! Root banner, liveness, readiness and Prometheus scrape endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to Artisio API",
        "version": "2.0.0",
        "status": "running"
    }))
}

/// Liveness plus a MongoDB ping. Reports 503 while the database is
/// unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach MongoDB");
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    (
        status,
        Json(json!({
            "status": if status.is_success() { "ok" } else { "degraded" },
            "service": state.config.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
        })),
    )
}

pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
