//! Endpoint-level operations: build the query, run it, shape the rows.

use serde_json::Value;
use tracing::debug;

use crate::config::{StoreConfig, TableName};
use crate::error::{Error, Result};
use crate::query::{count_query, detail_query, list_query, probe_query, search_query, Filter, Page};
use crate::record::Plaque;
use crate::store::PlaqueStore;

/// One page of plaques plus the number of rows matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaquePage {
    pub plaques: Vec<Plaque>,
    pub total: u64,
}

/// Plaque queries against one configured table.
#[derive(Debug, Clone)]
pub struct PlaqueRepository {
    store: PlaqueStore,
    table: TableName,
}

impl PlaqueRepository {
    pub fn new(store: PlaqueStore, table: TableName) -> Self {
        Self { store, table }
    }

    /// Connect to the store described by `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(
            PlaqueStore::connect(&config.backend)?,
            config.table.clone(),
        ))
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn store(&self) -> &PlaqueStore {
        &self.store
    }

    /// Fetch one plaque by id; `None` when no row matches.
    pub async fn detail(&self, id: &str) -> Result<Option<Plaque>> {
        let rows = self.store.query(&detail_query(&self.table, id)).await?;
        rows.first().map(Plaque::from_row).transpose()
    }

    /// Count matching rows, then fetch the requested page.
    pub async fn list(&self, filter: &Filter, page: Page) -> Result<PlaquePage> {
        let count_rows = self.store.query(&count_query(&self.table, filter)).await?;
        let total = count_rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(as_count)
            .ok_or_else(|| Error::InvalidRow {
                message: "count query returned no 'total' column".to_string(),
            })?;

        let rows = self.store.query(&list_query(&self.table, filter, page)).await?;
        debug!(total = total, returned = rows.len(), "list query complete");

        Ok(PlaquePage {
            plaques: Plaque::from_rows(&rows)?,
            total,
        })
    }

    /// Case-insensitive substring search on recognized text.
    pub async fn search(&self, text: &str, filter: &Filter, page: Page) -> Result<Vec<Plaque>> {
        let query = search_query(self.store.dialect(), &self.table, text, filter, page);
        let rows = self.store.query(&query).await?;
        Plaque::from_rows(&rows)
    }

    /// Readiness probe against the configured table.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping(&probe_query(&self.table)).await
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
