//! Request correlation and HTTP metrics.
//!
//! [`MetricsLayer`] wraps the whole router. For every request it
//!
//! 1. takes `X-Request-ID` from the client or mints a UUID v7, stores it in the
//!    request extensions (read back by the [`RequestId`] extractor) and echoes
//!    it on the response;
//! 2. opens a `request` span carrying the ID, method, route and peer address;
//! 3. records `http_requests_total`, `http_request_duration_seconds`,
//!    `http_request_size_bytes` and `http_response_size_bytes`.
//!
//! Route labels collapse `/api/v1/detail/{id}` so plaque ids never become
//! label values.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Request, Response};
use http::header;
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Header carrying the correlation ID.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const DETAIL_PREFIX: &str = "/api/v1/detail/";
const DETAIL_ROUTE: &str = "/api/v1/detail/{id}";

/// Correlation ID attached to logs, error bodies and the `X-Request-ID`
/// response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered ID.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handlers receive the ID assigned by [`MetricsLayer`]; outside the layer it
/// falls back to the request headers.
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<RequestId>() {
            Some(id) => id.clone(),
            None => request_id_from_headers(&parts.headers),
        })
    }
}

/// Client-supplied `X-Request-ID`, or a generated one when the header is
/// absent, blank or not valid UTF-8.
pub fn request_id_from_headers(headers: &HeaderMap) -> RequestId {
    match headers.get(REQUEST_ID_HEADER).map(HeaderValue::to_str) {
        Some(Ok(id)) if !id.trim().is_empty() => RequestId::new(id.trim()),
        _ => RequestId::generate(),
    }
}

/// Route label for a request path.
pub fn route_label(path: &str) -> &str {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    match path.strip_prefix(DETAIL_PREFIX) {
        Some(id) if !id.is_empty() => DETAIL_ROUTE,
        _ => path,
    }
}

fn status_class(status: u16) -> &'static str {
    match status / 100 {
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

fn content_length(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// `method` and `path` labels shared by every HTTP metric of one request.
#[derive(Debug, Clone)]
struct RouteLabels {
    method: String,
    path: String,
}

impl RouteLabels {
    fn of<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().as_str().to_string(),
            path: route_label(req.uri().path()).to_string(),
        }
    }

    fn pairs(&self) -> [(&'static str, String); 2] {
        [("method", self.method.clone()), ("path", self.path.clone())]
    }

    fn record_request_size(&self, bytes: f64) {
        metrics::histogram!("http_request_size_bytes", &self.pairs()).record(bytes);
    }

    /// `status` is `None` when the inner service failed without a response.
    fn record_completion(
        &self,
        status: Option<u16>,
        elapsed: Duration,
        response_bytes: Option<f64>,
    ) {
        let class = status.map_or("5xx", status_class);
        let [method, path] = self.pairs();
        let counted = [method, path, ("status", class.to_string())];

        metrics::counter!("http_requests_total", &counted).increment(1);
        metrics::histogram!("http_request_duration_seconds", &self.pairs())
            .record(elapsed.as_secs_f64());
        if let Some(bytes) = response_bytes {
            metrics::histogram!("http_response_size_bytes", &self.pairs()).record(bytes);
        }
    }
}

/// Tower layer assigning request IDs and recording HTTP metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: http_body::Body + Send + 'static,
    ResBody: http_body::Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let started = Instant::now();
        let labels = RouteLabels::of(&req);
        if let Some(bytes) = content_length(req.headers()) {
            labels.record_request_size(bytes);
        }

        let request_id = request_id_from_headers(req.headers());
        req.extensions_mut().insert(request_id.clone());
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %labels.method,
            path = %labels.path,
            remote_addr = peer.as_deref().unwrap_or("-"),
        );
        span.in_scope(|| tracing::debug!("request received"));

        MetricsFuture {
            inner: self.inner.call(req),
            started,
            labels,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Response future of [`MetricsService`].
    pub struct MetricsFuture<F> {
        #[pin]
        inner: F,
        started: Instant,
        labels: RouteLabels,
        request_id: RequestId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: http_body::Body,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _entered = this.span.enter();

        let mut result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };
        let elapsed = this.started.elapsed();
        let latency_ms = elapsed.as_secs_f64() * 1000.0;

        match result.as_mut() {
            Ok(response) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                let status = response.status().as_u16();
                this.labels.record_completion(
                    Some(status),
                    elapsed,
                    content_length(response.headers()),
                );
                tracing::info!(status, latency_ms, "request completed");
            }
            Err(_) => {
                this.labels.record_completion(None, elapsed, None);
                tracing::error!(latency_ms, "request failed");
            }
        }

        Poll::Ready(result)
    }
}
