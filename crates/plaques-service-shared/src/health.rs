//! Health check handlers for Kubernetes probes.
//!
//! Provides `/health/live` and `/health/ready` endpoints that return JSON
//! status responses for Kubernetes liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: "ok" or "not_ready: <reason>".
    pub status: String,

    /// Service name for identification.
    pub service: String,

    /// Service version from build-time.
    pub version: String,

    /// Configured backend (for readiness check).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Configured table (for readiness check).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl HealthStatus {
    /// Create a healthy liveness status.
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            backend: None,
            table: None,
        }
    }

    /// Create a ready status naming the store that answered the probe.
    pub fn ready(service: &str, version: &str, backend: &str, table: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            backend: Some(backend.to_string()),
            table: Some(table.to_string()),
        }
    }

    /// Create a not-ready status.
    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            service: service.to_string(),
            version: version.to_string(),
            backend: None,
            table: None,
        }
    }
}

/// Liveness probe handler.
///
/// Returns 200 OK if the process is running; the store is not contacted.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"plaques-service-list","version":"0.1.0"}
/// ```
pub async fn health_live(State(state): State<AppState>) -> impl IntoResponse {
    let status = HealthStatus::alive(state.service(), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Runs a probe query against the configured table and returns 503 if it
/// fails.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","service":"plaques-service-list","version":"0.1.0",
///  "backend":"bigquery","table":"csp-plaques.vision.plaques"}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = state.service();
    let version = env!("CARGO_PKG_VERSION");
    let repository = state.repository();

    if let Err(e) = repository.ping().await {
        warn!(error = %e, reason = e.reason(), "readiness probe failed");
        let status = HealthStatus::not_ready(service, version, e.reason());
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let status = HealthStatus::ready(
        service,
        version,
        state.backend(),
        repository.table().as_str(),
    );
    (StatusCode::OK, Json(status)).into_response()
}
