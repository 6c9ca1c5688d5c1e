//! Service health endpoints
//!
//! `/health` is the operator-facing summary; `/health/live` and
//! `/health/ready` are the probes the platform restarts and routes on.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

async fn database_reachable(state: &AppState) -> bool {
    sqlx::query("SELECT 1").execute(&state.pool).await.is_ok()
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // The database is the only hard dependency; the gateway and assistant
    // API are checked per request, not here.
    let db_ok = database_reachable(&state).await;

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if db_ok { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            database: if db_ok { "healthy" } else { "unhealthy" },
        }),
    )
}

/// GET /health/live — the process is up
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready — the process can serve traffic
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if database_reachable(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
