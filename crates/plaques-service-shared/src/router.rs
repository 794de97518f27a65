//! Router assembly shared by the service binaries and `plaques serve`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cors::{cors, CorsConfig};
use crate::handlers::{detail_by_path_handler, detail_handler, list_handler, search_handler};
use crate::metrics::{metrics_handler, MetricsConfig};
use crate::{health_live, health_ready, AppState, MetricsLayer};

/// Default HTTP port when `SERVICE_PORT` is unset or invalid.
pub const DEFAULT_PORT: u16 = 8080;

/// `GET /api/v1/detail` and `GET /api/v1/detail/{id}`. An empty last segment
/// is routed to the query-string handler so it fails validation as a 400.
pub fn detail_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/detail", get(detail_handler))
        .route("/api/v1/detail/", get(detail_handler))
        .route("/api/v1/detail/{id}", get(detail_by_path_handler))
}

/// `GET /api/v1/list`.
pub fn list_routes() -> Router<AppState> {
    Router::new().route("/api/v1/list", get(list_handler))
}

/// `GET /api/v1/search`.
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/v1/search", get(search_handler))
}

/// Wrap endpoint routes with health probes, the metrics endpoint, request
/// tracing, CORS and request metrics.
pub fn service_router(
    api: Router<AppState>,
    state: AppState,
    cors_config: CorsConfig,
    metrics_config: &MetricsConfig,
) -> Router {
    let mut router = api
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready));

    if metrics_config.enabled {
        router = router.route(&metrics_config.path, get(metrics_handler));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(Arc::new(cors_config), cors))
        .layer(MetricsLayer)
        .with_state(state)
}

/// Read `SERVICE_PORT`, defaulting to 8080.
pub fn port_from_env() -> u16 {
    std::env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Bind all interfaces on `port` and serve `app` until the process exits.
pub async fn serve(app: Router, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
