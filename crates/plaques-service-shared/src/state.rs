//! Application state for HTTP microservices.
//!
//! This module provides the shared state structure that axum handlers use to
//! reach the configured plaques table.

use std::sync::Arc;

use plaques_lib::{Error as LibError, PlaqueRepository, StoreConfig};

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The environment did not describe a usable store.
    Config(LibError),

    /// The store could not be opened.
    StoreOpen(LibError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid store configuration: {}", e),
            Self::StoreOpen(e) => write!(f, "failed to open plaque store: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) | Self::StoreOpen(e) => Some(e),
        }
    }
}

/// Shared application state for all axum handlers.
///
/// This struct is cheaply cloneable (using `Arc` internally) and should be
/// shared via axum's `State` extractor.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, extract::State};
/// use plaques_service_shared::AppState;
///
/// async fn handler(State(state): State<AppState>) {
///     let plaque = state.repository().detail("p-1").await;
///     // ... shape the response
/// }
///
/// let state = AppState::from_env().unwrap();
/// let app = Router::new()
///     .route("/api/v1/detail", get(handler))
///     .with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    service: Arc<str>,
}

/// Service name reported by health probes until [`AppState::with_service`]
/// names the binary.
pub const DEFAULT_SERVICE_NAME: &str = "plaques";

struct AppStateInner {
    repository: PlaqueRepository,
    backend: &'static str,
}

impl AppState {
    /// Build state from `PLAQUES_*` and `BIGQUERY_*` environment variables.
    pub fn from_env() -> Result<Self, AppStateError> {
        let config = StoreConfig::from_env().map_err(AppStateError::Config)?;
        Self::from_config(&config)
    }

    /// Build state from an explicit store configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self, AppStateError> {
        tracing::info!(
            backend = config.backend_name(),
            table = %config.table,
            "connecting to plaque store"
        );
        let repository = PlaqueRepository::from_config(config).map_err(AppStateError::StoreOpen)?;
        Ok(Self::from_parts(repository, config.backend_name()))
    }

    /// Wrap an already constructed repository.
    ///
    /// This is useful for testing against an in-memory fixture.
    pub fn from_repository(repository: PlaqueRepository) -> Self {
        let backend = match repository.store() {
            plaques_lib::PlaqueStore::Sqlite(_) => "sqlite",
            plaques_lib::PlaqueStore::BigQuery(_) => "bigquery",
        };
        Self::from_parts(repository, backend)
    }

    fn from_parts(repository: PlaqueRepository, backend: &'static str) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                repository,
                backend,
            }),
            service: Arc::from(DEFAULT_SERVICE_NAME),
        }
    }

    /// Name this state after the binary serving it.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Arc::from(service.into());
        self
    }

    /// Access the plaque repository.
    pub fn repository(&self) -> &PlaqueRepository {
        &self.inner.repository
    }

    /// Name of the configured backend (`sqlite` or `bigquery`).
    pub fn backend(&self) -> &'static str {
        self.inner.backend
    }

    /// Service name reported by the health probes.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("backend", &self.inner.backend)
            .field("table", &self.inner.repository.table().as_str())
            .finish()
    }
}
