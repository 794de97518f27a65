//! JSON error bodies for the plaque endpoints.
//!
//! Every failure is reported as
//! `{"error": "<title>", "message": "<detail>", "request_id": "<id>"}` with a
//! matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use plaques_lib::Error as LibError;

/// Message returned for every backend failure. Causes stay in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred while querying plaques";

/// Error response shared by all endpoints.
///
/// # Example
///
/// ```
/// use plaques_service_shared::ApiError;
///
/// let err = ApiError::bad_request("The 'id' parameter is required", "req-12345");
/// assert_eq!(err.status().as_u16(), 400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Short title matching the status code.
    pub error: String,

    /// Human-readable explanation of this occurrence.
    pub message: String,

    /// Correlation ID for the failed request.
    pub request_id: String,

    #[serde(skip, default = "default_status")]
    status: u16,
}

fn default_status() -> u16 {
    StatusCode::INTERNAL_SERVER_ERROR.as_u16()
}

impl ApiError {
    /// Create an error with an explicit status.
    pub fn new(
        status: StatusCode,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: message.into(),
            request_id: request_id.into(),
            status: status.as_u16(),
        }
    }

    /// 400 for a missing or malformed parameter.
    pub fn bad_request(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, request_id)
    }

    /// 404 for an unknown plaque id.
    pub fn not_found(id: &str, request_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("No plaque found with id '{}'", id),
            request_id,
        )
    }

    /// 500 with the generic message.
    pub fn internal_error(request_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_ERROR_MESSAGE,
            request_id,
        )
    }

    /// 503 for a store that fails its readiness probe.
    pub fn service_unavailable(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, request_id)
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Convert a library error into a 500 response, logging the cause.
///
/// The `request_id` must be provided separately since library errors don't have it.
pub fn from_lib_error(err: &LibError, request_id: &str) -> ApiError {
    error!(
        request_id = %request_id,
        reason = err.reason(),
        error = %err,
        "plaque query failed"
    );
    ApiError::internal_error(request_id)
}
