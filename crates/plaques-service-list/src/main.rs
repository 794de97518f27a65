//! Plaque list HTTP microservice.
//!
//! # Endpoints
//!
//! - `GET /api/v1/list` - Page through plaques by descending confidence,
//!   optionally filtered by `confidence_threshold` and a `north`/`south`/
//!   `east`/`west` bounding box
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live` - Kubernetes liveness probe
//! - `GET /health/ready` - Kubernetes readiness probe
//!
//! # Configuration
//!
//! - `PLAQUES_BACKEND`, `PLAQUES_TABLE`, `PLAQUES_DB_PATH`, `BIGQUERY_*` - Store selection
//! - `CORS_ALLOWED_ORIGINS` - Origins echoed in CORS responses
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `SERVICE_PORT` - HTTP port (default: 8080)

use axum::Router;
use tracing::{error, info, warn};

use plaques_service_shared::{
    init_logging, init_metrics, list_routes, port_from_env, serve, service_router, AppState,
    CorsConfig, LoggingConfig, MetricsConfig,
};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

fn app(state: AppState, cors: CorsConfig, metrics: &MetricsConfig) -> Router {
    service_router(list_routes(), state.with_service(SERVICE_NAME), cors, metrics)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (reads LOG_FORMAT from environment)
    let logging_config = LoggingConfig::from_env().with_service(SERVICE_NAME);
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if metrics_config.enabled {
        if let Err(e) = init_metrics(&metrics_config) {
            warn!(error = %e, "failed to initialize metrics, continuing without metrics");
        }
    }

    let port = port_from_env();
    info!(port = port, "starting list service");

    let state = AppState::from_env().map_err(|e| {
        error!(error = %e, "failed to load application state");
        e
    })?;

    info!(
        backend = state.backend(),
        table = %state.repository().table(),
        "application state loaded"
    );

    serve(app(state, CorsConfig::from_env(), &metrics_config), port).await?;
    Ok(())
}
