//! Plaque detail HTTP microservice.
//!
//! # Endpoints
//!
//! - `GET /api/v1/detail?id={id}` - Fetch one plaque
//! - `GET /api/v1/detail/{id}` - Same, with the id as the last path segment
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
    detail_routes, init_logging, init_metrics, port_from_env, serve, service_router, AppState,
    CorsConfig, LoggingConfig, MetricsConfig,
};

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

fn app(state: AppState, cors: CorsConfig, metrics: &MetricsConfig) -> Router {
    service_router(detail_routes(), state.with_service(SERVICE_NAME), cors, metrics)
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
    info!(port = port, "starting detail service");

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
    use plaques_service_shared::test_utils::{
        broken_store_state, fixture_ids, test_request_id, test_state,
    };
    use plaques_service_shared::INTERNAL_ERROR_MESSAGE;
    use serde_json::{json, Value};

    fn server() -> TestServer {
        TestServer::new(app(
            test_state(),
            CorsConfig::default(),
            &MetricsConfig::default(),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn detail_by_query_returns_nested_plaque() {
        let response = server()
            .get("/api/v1/detail")
            .add_query_param("id", fixture_ids::ANNE)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], "plq-anne");
        assert_eq!(body["text"], "Hier woonde Anne Frank");
        assert_eq!(body["confidence"], 0.95);
        assert_eq!(
            body["location"],
            json!({"latitude": 52.3752, "longitude": 4.884, "source": "projected"})
        );
        assert_eq!(body["camera"]["bearing"], 87.5);
        assert_eq!(
            body["detection"]["bounding_box"],
            json!({"x": 1200.0, "y": 800.0, "width": 640.0, "height": 320.0})
        );
        assert_eq!(body["detection"]["image_size"], json!({"width": 4032, "height": 3024}));
        assert_eq!(body["ocr"]["services"]["azure"], Value::Null);
        assert_eq!(
            body["ocr"]["services"]["claude"],
            json!({"text": "Hier woonde Anne Frank", "confidence": 0.95})
        );
        assert_eq!(
            body["ocr"]["consensus"]["agreement_matrix"],
            json!([[1.0, 0.98], [0.98, 1.0]])
        );
        assert_eq!(
            body["geometry"]["crop"],
            json!({"x": 1180, "y": 780, "width": 680, "height": 360})
        );
        assert_eq!(body["created_at"], "2023-05-03T08:30:00Z");
    }

    #[tokio::test]
    async fn detail_by_path_segment() {
        let response = server().get("/api/v1/detail/plq-1650").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], "plq-1650");
        assert_eq!(body["location"]["source"], "camera");
        assert_eq!(body["images"], Value::Null);
        assert_eq!(body["detection"], Value::Null);
    }

    #[tokio::test]
    async fn query_id_takes_precedence_over_path() {
        let response = server()
            .get("/api/v1/detail/plq-1650")
            .add_query_param("id", fixture_ids::MULTATULI)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["id"], "plq-multatuli");
    }

    #[tokio::test]
    async fn sparse_row_uses_defaults_and_nulls() {
        let response = server().get("/api/v1/detail/plq-bare").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["text"], "No text detected");
        assert_eq!(body["confidence"], 0.0);
        for key in ["location", "camera", "images", "exif", "detection", "ocr", "geometry"] {
            assert_eq!(body[key], Value::Null, "{} should be null", key);
        }
    }

    #[tokio::test]
    async fn missing_id_is_bad_request() {
        let request_id = test_request_id();
        let response = server()
            .get("/api/v1/detail")
            .add_header(
                header::HeaderName::from_static("x-request-id"),
                HeaderValue::from_str(&request_id).unwrap(),
            )
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["request_id"], request_id.as_str());
        assert!(body["message"].as_str().unwrap().contains("'id'"));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let response = server()
            .get("/api/v1/detail")
            .add_query_param("id", "plq-missing")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "Not Found");
        assert!(body["message"].as_str().unwrap().contains("plq-missing"));
    }

    #[tokio::test]
    async fn injection_attempt_is_just_an_unknown_id() {
        let response = server()
            .get("/api/v1/detail")
            .add_query_param("id", "plq-anne' OR '1'='1")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn errors_carry_cors_headers() {
        let response = server()
            .get("/api/v1/detail")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:5000"))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5000"
        );
    }

    #[tokio::test]
    async fn preflight_is_no_content() {
        let response = server()
            .method(axum::http::Method::OPTIONS, "/api/v1/detail/plq-anne")
            .await;

        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "3600");
    }

    #[tokio::test]
    async fn readiness_probe_reaches_store() {
        server().get("/health/ready").await.assert_status_ok();
    }

    #[tokio::test]
    async fn empty_path_segment_is_bad_request() {
        let response = server().get("/api/v1/detail/").await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Bad Request");
        assert!(body["message"].as_str().unwrap().contains("'id'"));
        assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn health_names_this_service() {
        let body: Value = server().get("/health/live").await.json();
        assert_eq!(body["service"], "plaques-service-detail");
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
            .get("/api/v1/detail")
        .add_query_param("id", "plq-anne")
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
