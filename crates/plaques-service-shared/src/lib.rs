//! Shared infrastructure for the plaques HTTP microservices.
//!
//! This crate provides common functionality used across all microservice containers:
//!
//! - [`AppState`]: The configured plaque repository
//! - [`handlers`]: Thin axum handlers for the detail, list and search endpoints
//! - [`router`]: Route groups plus the common health/metrics/CORS wrapping
//! - [`health`]: Health check handlers for Kubernetes liveness/readiness probes
//! - [`ApiError`]: `{"error", "message", "request_id"}` error bodies
//! - [`cors`]: Origin allow-list and preflight handling
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request tracking and metrics middleware
//! - Request types with validation for each endpoint
//!
//! # Architecture
//!
//! The services follow a thin-handler pattern where all query building and row
//! shaping resides in `plaques-lib`. This crate provides only HTTP glue:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Parse query string                                       │
//! │  - Validate parameters                                      │
//! │  - Call plaques-lib repository                              │
//! │  - Format response                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides a seeded in-memory state for handler
//! testing. Enable the `test-utils` feature to access it from dependent crates.

#![deny(warnings)]

pub mod cors;
mod error;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod request;
mod response;
pub mod router;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cors::CorsConfig;
pub use error::{from_lib_error, ApiError, INTERNAL_ERROR_MESSAGE};
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_plaques_returned, record_query, record_query_failed,
    MetricsConfig, MetricsError,
};
pub use middleware::{request_id_from_headers, MetricsLayer, RequestId, REQUEST_ID_HEADER};
pub use request::{DetailRequest, ListRequest, SearchRequest, Validate, MAX_LIMIT};
pub use response::{ApiResponse, ListResponse, SearchResponse};
pub use router::{detail_routes, list_routes, port_from_env, search_routes, serve, service_router};
pub use state::{AppState, AppStateError, DEFAULT_SERVICE_NAME};
