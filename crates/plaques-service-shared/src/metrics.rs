//! Prometheus exposition and plaque query counters.
//!
//! HTTP-level metrics come from [`MetricsLayer`](crate::MetricsLayer); this
//! module owns the recorder and the query-level series:
//!
//! | Series | Kind | Labels |
//! |--------|------|--------|
//! | `plaques_queries_total` | counter | `endpoint` |
//! | `plaques_query_failures_total` | counter | `endpoint`, `reason` |
//! | `plaques_returned` | histogram | `endpoint` |
//!
//! Without [`init_metrics`] the `metrics` facade discards everything, so the
//! helpers are safe to call from tests.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

const DEFAULT_METRICS_PATH: &str = "/metrics";

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Whether to expose `/metrics`, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Read `METRICS_ENABLED` (anything but `false` enables) and
    /// `METRICS_PATH` (must start with `/`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            enabled: match lookup("METRICS_ENABLED") {
                Some(v) => !v.trim().eq_ignore_ascii_case("false"),
                None => defaults.enabled,
            },
            path: lookup("METRICS_PATH")
                .map(|p| p.trim().to_string())
                .filter(|p| p.starts_with('/'))
                .unwrap_or(defaults.path),
        }
    }
}

/// Install the process-wide Prometheus recorder. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if RECORDER.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;
    RECORDER
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics_handler() -> String {
    match RECORDER.get() {
        Some(handle) => handle.render(),
        None => "# metrics recorder not installed\n".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("metrics are disabled"),
            Self::AlreadyInitialized => f.write_str("metrics recorder already initialized"),
            Self::InstallFailed(cause) => {
                write!(f, "failed to install metrics recorder: {}", cause)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

/// Count a query sent to the store by `endpoint` (`detail`, `list`, `search`).
pub fn record_query(endpoint: &'static str) {
    metrics::counter!("plaques_queries_total", "endpoint" => endpoint).increment(1);
}

/// Count a failed request. `reason` is `validation_error`, `not_found` or a
/// library [`reason`](plaques_lib::Error::reason).
pub fn record_query_failed(endpoint: &'static str, reason: &'static str) {
    metrics::counter!(
        "plaques_query_failures_total",
        "endpoint" => endpoint,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_plaques_returned(count: usize, endpoint: &'static str) {
    metrics::histogram!("plaques_returned", "endpoint" => endpoint).record(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        assert_eq!(MetricsConfig::from_lookup(|_| None), MetricsConfig::default());
        assert_eq!(MetricsConfig::default().path, "/metrics");
    }

    #[test]
    fn test_config_from_lookup() {
        let config = MetricsConfig::from_lookup(|key| match key {
            "METRICS_ENABLED" => Some("FALSE".to_string()),
            "METRICS_PATH" => Some("/internal/metrics".to_string()),
            _ => None,
        });
        assert!(!config.enabled);
        assert_eq!(config.path, "/internal/metrics");
    }

    #[test]
    fn test_relative_path_is_ignored() {
        let config = MetricsConfig::from_lookup(|key| match key {
            "METRICS_PATH" => Some("metrics".to_string()),
            _ => None,
        });
        assert_eq!(config.path, "/metrics");
        assert!(config.enabled);
    }

    #[test]
    fn test_disabled_config_does_not_install() {
        let config = MetricsConfig {
            enabled: false,
            path: "/metrics".to_string(),
        };
        assert_eq!(init_metrics(&config), Err(MetricsError::Disabled));
    }

    #[tokio::test]
    async fn test_handler_without_recorder() {
        let body = metrics_handler().await;
        assert!(body.starts_with('#') || body.is_empty());
    }

    #[test]
    fn test_helpers_without_recorder() {
        record_query("list");
        record_query_failed("detail", "not_found");
        record_plaques_returned(25, "search");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            MetricsError::AlreadyInitialized.to_string(),
            "metrics recorder already initialized"
        );
        assert!(MetricsError::InstallFailed("port in use".to_string())
            .to_string()
            .ends_with("port in use"));
    }
}
