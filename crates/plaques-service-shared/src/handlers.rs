//! Thin axum handlers for the plaque endpoints.
//!
//! Each handler parses and validates its query string, calls the
//! [`PlaqueRepository`](plaques_lib::PlaqueRepository) and shapes the body.
//! Backend failures are logged with their cause and answered with a generic 500.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use tracing::info;

use plaques_lib::Plaque;

use crate::metrics::{record_plaques_returned, record_query, record_query_failed};
use crate::{
    from_lib_error, ApiError, ApiResponse, AppState, DetailRequest, ListRequest, ListResponse,
    RequestId, SearchRequest, SearchResponse, Validate,
};

const DETAIL: &str = "detail";
const LIST: &str = "list";
const SEARCH: &str = "search";

/// Unwrap the query extractor, turning rejections into the shared error body.
fn parse<T>(
    query: Result<Query<T>, QueryRejection>,
    endpoint: &'static str,
    request_id: &RequestId,
) -> Result<T, Box<ApiError>> {
    query.map(|Query(request)| request).map_err(|rejection| {
        record_query_failed(endpoint, "validation_error");
        Box::new(ApiError::bad_request(
            rejection.body_text(),
            request_id.as_str(),
        ))
    })
}

fn validate<T: Validate>(
    request: &T,
    endpoint: &'static str,
    request_id: &RequestId,
) -> Result<(), Box<ApiError>> {
    request.validate(request_id.as_str()).inspect_err(|_| {
        record_query_failed(endpoint, "validation_error");
    })
}

fn backend_failure(
    err: plaques_lib::Error,
    endpoint: &'static str,
    request_id: &RequestId,
) -> Box<ApiError> {
    record_query_failed(endpoint, err.reason());
    Box::new(from_lib_error(&err, request_id.as_str()))
}

/// Handle `GET /api/v1/detail?id=...`.
pub async fn detail_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<DetailRequest>, QueryRejection>,
) -> ApiResponse<Plaque> {
    let result = match parse(query, DETAIL, &request_id) {
        Ok(request) => detail(&state, &request_id, request).await,
        Err(err) => Err(err),
    };
    result.into()
}

/// Handle `GET /api/v1/detail/{id}`; a non-blank `id` query parameter still wins.
pub async fn detail_by_path_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<String>,
    query: Result<Query<DetailRequest>, QueryRejection>,
) -> ApiResponse<Plaque> {
    let result = match parse(query, DETAIL, &request_id) {
        Ok(request) => detail(&state, &request_id, request.with_path_id(id)).await,
        Err(err) => Err(err),
    };
    result.into()
}

async fn detail(
    state: &AppState,
    request_id: &RequestId,
    request: DetailRequest,
) -> Result<Plaque, Box<ApiError>> {
    validate(&request, DETAIL, request_id)?;
    let id = request.id().unwrap_or_default();

    info!(request_id = %request_id, id = %id, "handling detail request");
    record_query(DETAIL);

    match state.repository().detail(id).await {
        Ok(Some(plaque)) => {
            record_plaques_returned(1, DETAIL);
            info!(request_id = %request_id, id = %id, "detail completed");
            Ok(plaque)
        }
        Ok(None) => {
            record_query_failed(DETAIL, "not_found");
            info!(request_id = %request_id, id = %id, "plaque not found");
            Err(Box::new(ApiError::not_found(id, request_id.as_str())))
        }
        Err(e) => Err(backend_failure(e, DETAIL, request_id)),
    }
}

/// Handle `GET /api/v1/list`.
pub async fn list_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<ListRequest>, QueryRejection>,
) -> ApiResponse<ListResponse> {
    let result = match parse(query, LIST, &request_id) {
        Ok(request) => list(&state, &request_id, request).await,
        Err(err) => Err(err),
    };
    result.into()
}

async fn list(
    state: &AppState,
    request_id: &RequestId,
    request: ListRequest,
) -> Result<ListResponse, Box<ApiError>> {
    validate(&request, LIST, request_id)?;
    let page = request.page(request_id.as_str())?;
    let filter = request.filter(request_id.as_str())?;

    info!(
        request_id = %request_id,
        limit = page.limit,
        offset = page.offset,
        confidence_threshold = ?filter.min_confidence,
        bbox = ?filter.bbox,
        "handling list request"
    );
    record_query(LIST);

    let result = state
        .repository()
        .list(&filter, page)
        .await
        .map_err(|e| backend_failure(e, LIST, request_id))?;

    record_plaques_returned(result.plaques.len(), LIST);
    info!(
        request_id = %request_id,
        count = result.plaques.len(),
        total = result.total,
        "list completed"
    );

    Ok(ListResponse {
        count: result.plaques.len(),
        plaques: result.plaques,
        total: result.total,
        limit: page.limit,
        offset: page.offset,
    })
}

/// Handle `GET /api/v1/search`.
pub async fn search_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> ApiResponse<SearchResponse> {
    let result = match parse(query, SEARCH, &request_id) {
        Ok(request) => search(&state, &request_id, request).await,
        Err(err) => Err(err),
    };
    result.into()
}

async fn search(
    state: &AppState,
    request_id: &RequestId,
    request: SearchRequest,
) -> Result<SearchResponse, Box<ApiError>> {
    validate(&request, SEARCH, request_id)?;
    let text = request.text().unwrap_or_default().to_string();
    let page = request.window.page(request_id.as_str())?;
    let filter = request.window.filter(request_id.as_str())?;

    info!(
        request_id = %request_id,
        text = %text,
        limit = page.limit,
        offset = page.offset,
        confidence_threshold = ?filter.min_confidence,
        bbox = ?filter.bbox,
        "handling search request"
    );
    record_query(SEARCH);

    let plaques = state
        .repository()
        .search(&text, &filter, page)
        .await
        .map_err(|e| backend_failure(e, SEARCH, request_id))?;

    record_plaques_returned(plaques.len(), SEARCH);
    info!(request_id = %request_id, count = plaques.len(), "search completed");

    Ok(SearchResponse {
        query: text,
        count: plaques.len(),
        plaques,
        limit: page.limit,
        offset: page.offset,
    })
}
