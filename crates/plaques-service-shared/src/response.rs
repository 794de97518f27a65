//! Response bodies for the plaque endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use plaques_lib::Plaque;

use crate::ApiError;

/// Body of `GET /api/v1/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub plaques: Vec<Plaque>,
    /// Number of plaques in this page.
    pub count: usize,
    /// Number of plaques matching the filters across all pages.
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Body of `GET /api/v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The search text that was matched, with surrounding whitespace removed.
    pub query: String,
    pub plaques: Vec<Plaque>,
    pub count: usize,
    pub limit: u32,
    pub offset: u32,
}

/// HTTP response - either a success body or an [`ApiError`].
#[derive(Debug)]
pub enum ApiResponse<T> {
    Success(T),
    Error(Box<ApiError>),
}

impl<T> From<Result<T, Box<ApiError>>> for ApiResponse<T> {
    fn from(result: Result<T, Box<ApiError>>) -> Self {
        match result {
            Ok(body) => ApiResponse::Success(body),
            Err(err) => ApiResponse::Error(err),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error(err) => (*err).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_field_order() {
        let body = ListResponse {
            plaques: Vec::new(),
            count: 0,
            total: 12,
            limit: 100,
            offset: 0,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"plaques":[],"count":0,"total":12,"limit":100,"offset":0}"#
        );
    }

    #[test]
    fn test_error_variant_uses_error_status() {
        let response: ApiResponse<ListResponse> =
            Err(Box::new(ApiError::bad_request("bad", "req-1"))).into();
        assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
