//! `serve` subcommand: detail, list and search on one listener.

use anyhow::{Context, Result};
use tracing::{info, warn};

use plaques_lib::StoreConfig;
use plaques_service_shared::{
    detail_routes, init_metrics, list_routes, search_routes, serve, service_router, AppState,
    CorsConfig, MetricsConfig,
};

pub async fn handle_serve(config: &StoreConfig, port: u16) -> Result<()> {
    let metrics_config = MetricsConfig::from_env();
    if metrics_config.enabled {
        if let Err(e) = init_metrics(&metrics_config) {
            warn!(error = %e, "failed to initialize metrics, continuing without metrics");
        }
    }

    let state = AppState::from_config(config)
        .context("failed to load application state")?
        .with_service("plaques");
    info!(
        backend = state.backend(),
        table = %state.repository().table(),
        "application state loaded"
    );

    let api = detail_routes().merge(list_routes()).merge(search_routes());
    let app = service_router(api, state, CorsConfig::from_env(), &metrics_config);

    serve(app, port)
        .await
        .with_context(|| format!("server on port {} failed", port))
}
