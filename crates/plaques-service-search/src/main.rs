//! Plaque text search HTTP microservice.
//!
//! # Endpoints
//!
//! - `GET /api/v1/search?text={text}` - Case-insensitive substring search on
//!   the recognized text (`q` and `plaque_text` are accepted aliases), with
//!   the same paging and filters as the list service
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
    init_logging, init_metrics, port_from_env, search_routes, serve, service_router, AppState,
    CorsConfig, LoggingConfig, MetricsConfig,
};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

fn app(state: AppState, cors: CorsConfig, metrics: &MetricsConfig) -> Router {
    service_router(search_routes(), state.with_service(SERVICE_NAME), cors, metrics)
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
    info!(port = port, "starting search service");

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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use plaques_service_shared::test_utils::{broken_store_state, test_request_id, test_state};
    use plaques_service_shared::INTERNAL_ERROR_MESSAGE;
    use serde_json::Value;

    fn server() -> TestServer {
        TestServer::new(app(
            test_state(),
            CorsConfig::default(),
            &MetricsConfig::default(),
        ))
        .unwrap()
    }

    fn ids(body: &Value) -> Vec<&str> {
        body["plaques"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "WOONDE")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["query"], "WOONDE");
        assert_eq!(body["count"], 2);
        assert_eq!(body["limit"], 100);
        assert_eq!(body["offset"], 0);
        assert_eq!(ids(&body), vec!["plq-anne", "plq-multatuli"]);
        assert!(body.get("total").is_none());
    }

    #[tokio::test]
    async fn search_text_aliases() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("q", "anno")
            .await;
        assert_eq!(ids(&response.json::<Value>()), vec!["plq-1650"]);

        let response = server()
            .get("/api/v1/search")
            .add_query_param("plaque_text", "multatuli")
            .await;
        assert_eq!(ids(&response.json::<Value>()), vec!["plq-multatuli"]);

        // `text` wins over `q`
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "anne")
            .add_query_param("q", "anno")
            .await;
        assert_eq!(ids(&response.json::<Value>()), vec!["plq-anne"]);
    }

    #[tokio::test]
    async fn search_wildcards_are_literal() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "%")
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["count"], 0);
    }

    #[tokio::test]
    async fn search_with_filters_and_paging() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "woonde")
            .add_query_param("confidence_threshold", "0.9")
            .await;
        assert_eq!(ids(&response.json::<Value>()), vec!["plq-anne"]);

        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "woonde")
            .add_query_param("limit", 1)
            .add_query_param("offset", 1)
            .await;
        let body: Value = response.json();
        assert_eq!(ids(&body), vec!["plq-multatuli"]);
        assert_eq!(body["limit"], 1);
    }

    #[tokio::test]
    async fn search_requires_text() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("q", "   ")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Bad Request");
    }

    #[tokio::test]
    async fn search_validates_bbox() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "woonde")
            .add_query_param("north", "52")
            .add_query_param("south", "53")
            .add_query_param("east", "5")
            .add_query_param("west", "4")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_text_is_trimmed_before_matching_and_echo() {
        let response = server()
            .get("/api/v1/search")
            .add_query_param("text", "  WOONDE  ")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["query"], "WOONDE");
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn store_failure_is_generic_internal_error() {
        let server = TestServer::new(app(
            broken_store_state(),
            CorsConfig::default(),
            &MetricsConfig::default(),
        ))
        .unwrap();
        let request_id = test_request_id();

        let response = server
            .get("/api/v1/search")
        .add_query_param("text", "woonde")
            .add_header(
                header::HeaderName::from_static("x-request-id"),
                HeaderValue::from_str(&request_id).unwrap(),
            )
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"))
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        let text = response.text();
        assert!(!text.contains("gone"), "cause leaked: {}", text);
        assert!(!text.contains("no such table"), "cause leaked: {}", text);

        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert_eq!(body["request_id"], request_id.as_str());
    }
}
