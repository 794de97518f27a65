//! Analytic store backends.
//!
//! [`PlaqueStore`] exposes the one read interface every endpoint needs: run a
//! parameterized query and return rows as key-value maps.

mod bigquery;
mod sqlite;

pub use bigquery::{BigQueryStore, DEFAULT_BASE_URL};
pub use sqlite::SqliteStore;

use tracing::info;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::query::{Dialect, Query};
use crate::record::Row;

/// Read-only connection to the table's backing store.
#[derive(Debug, Clone)]
pub enum PlaqueStore {
    Sqlite(SqliteStore),
    BigQuery(BigQueryStore),
}

impl PlaqueStore {
    /// Build a store from configuration.
    ///
    /// SQLite files are opened eagerly; BigQuery is contacted lazily on the
    /// first query.
    pub fn connect(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Sqlite { path } => {
                info!(path = %path.display(), "opening sqlite store");
                Ok(Self::Sqlite(SqliteStore::open(path)?))
            }
            BackendConfig::BigQuery {
                project,
                location,
                access_token,
            } => {
                info!(project = %project, location = ?location, "using bigquery store");
                Ok(Self::BigQuery(BigQueryStore::new(
                    project.clone(),
                    location.clone(),
                    access_token.clone(),
                )?))
            }
        }
    }

    /// SQL dialect understood by this backend.
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::BigQuery(_) => Dialect::BigQuery,
        }
    }

    /// Execute a read query.
    pub async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        match self {
            Self::Sqlite(store) => store.query(query).await,
            Self::BigQuery(store) => store.query(query).await,
        }
    }

    /// Confirm `probe` can be executed; BigQuery validates it with a dry run.
    pub async fn ping(&self, probe: &Query) -> Result<()> {
        match self {
            Self::Sqlite(store) => store.query(probe).await.map(|_| ()),
            Self::BigQuery(store) => store.dry_run(probe).await,
        }
    }
}

impl From<SqliteStore> for PlaqueStore {
    fn from(store: SqliteStore) -> Self {
        Self::Sqlite(store)
    }
}

impl From<BigQueryStore> for PlaqueStore {
    fn from(store: BigQueryStore) -> Self {
        Self::BigQuery(store)
    }
}
