//! Health check endpoints.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use eventpass_postgres::HealthProbe;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Liveness. Does not touch dependencies.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"ok","version":"0.1.0"}
/// ```
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Active database answered
    pub database: bool,
    /// `primary` or `replica`
    pub role: &'static str,
}

/// Readiness: pings the active database and reports its role.
///
/// Returns 503 while the active database does not answer.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"ready":true,"database":true,"role":"primary"}
/// ```
pub async fn readiness_check<R, G, P, C>(
    State(state): State<AppState<R, G, P, C>>,
) -> (StatusCode, Json<ReadinessResponse>)
where
    C: HealthProbe,
{
    let database = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            false
        }
    };
    let role = state.store.role().await;

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
            role: role.as_str(),
        }),
    )
}
