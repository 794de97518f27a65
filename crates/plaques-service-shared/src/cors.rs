//! CORS handling for the public plaque endpoints.
//!
//! Allow-listed origins are echoed back (with `Vary: Origin`); anything else,
//! including requests without an `Origin` header, receives `*`. Preflight
//! `OPTIONS` requests are answered here with `204 No Content` and never reach
//! a handler.
//!
//! # Environment Variables
//!
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origins replacing the default list

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

/// Origins echoed when no override is configured.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "https://csp-plaques.web.app",
    "http://localhost:3000",
    "http://localhost:5000",
];

const ALLOW_METHODS: &str = "GET, POST";
const ALLOW_HEADERS: &str = "Content-Type";
const MAX_AGE_SECS: &str = "3600";

/// Origin allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl CorsConfig {
    /// Read `CORS_ALLOWED_ORIGINS`, falling back to the defaults when unset or empty.
    pub fn from_env() -> Self {
        std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| Self::from_list(&raw))
            .unwrap_or_default()
    }

    /// Parse a comma-separated origin list.
    pub fn from_list(raw: &str) -> Self {
        let allowed_origins: Vec<String> = raw
            .split(',')
            .map(|o| o.trim().trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        if allowed_origins.is_empty() {
            Self::default()
        } else {
            Self { allowed_origins }
        }
    }

    /// Value for `Access-Control-Allow-Origin`, and whether it echoes the caller.
    pub fn allow_origin(&self, origin: Option<&str>) -> (HeaderValue, bool) {
        match origin {
            Some(origin) if self.allowed_origins.iter().any(|o| o == origin) => {
                match HeaderValue::from_str(origin) {
                    Ok(value) => (value, true),
                    Err(_) => (HeaderValue::from_static("*"), false),
                }
            }
            _ => (HeaderValue::from_static("*"), false),
        }
    }
}

/// Axum middleware applying [`CorsConfig`] to every response.
///
/// Install with `axum::middleware::from_fn_with_state(Arc::new(config), cors)`.
pub async fn cors(State(config): State<Arc<CorsConfig>>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let (allow_origin, echoed) = config.allow_origin(origin.as_deref());

    let mut response = if request.method() == Method::OPTIONS {
        let mut preflight = Response::new(Body::empty());
        *preflight.status_mut() = StatusCode::NO_CONTENT;
        let headers = preflight.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECS),
        );
        preflight
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    if echoed {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
    response
}
