//! Plaques library entry points.
//!
//! This crate holds everything needed to read the analytic plaques table:
//! configuration, parameterized SQL, the SQLite and BigQuery backends, and the
//! shaping of flat rows into nested plaque documents. Higher-level consumers
//! (CLI, HTTP services) should only depend on the items exported here instead
//! of reimplementing behavior.

#![deny(warnings)]

pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod repository;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

pub use config::{BackendConfig, StoreConfig, TableName, DEFAULT_DB_PATH, DEFAULT_TABLE};
pub use error::{Error, Result};
pub use query::{Dialect, Filter, GeoBounds, Page, Param, Query};
pub use record::{Location, LocationSource, Plaque, Row, TEXT_PLACEHOLDER};
pub use repository::{PlaquePage, PlaqueRepository};
pub use store::{BigQueryStore, PlaqueStore, SqliteStore};
