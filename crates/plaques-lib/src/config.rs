//! Store configuration resolved from the environment.
//!
//! The only value shared by every endpoint is the name of the backing table.
//! The remaining settings select and parameterize the backend.
//!
//! # Environment Variables
//!
//! - `PLAQUES_TABLE`: table name (default `plaques`); for BigQuery use
//!   `project.dataset.table`
//! - `PLAQUES_BACKEND`: `sqlite` (default) or `bigquery`
//! - `PLAQUES_DB_PATH`: SQLite file path (default `/data/plaques.db`)
//! - `BIGQUERY_PROJECT`: project that runs the query jobs
//! - `BIGQUERY_LOCATION`: optional job location (e.g. `EU`)
//! - `BIGQUERY_ACCESS_TOKEN`: optional static OAuth token

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default table name when `PLAQUES_TABLE` is unset.
pub const DEFAULT_TABLE: &str = "plaques";

/// Default SQLite path when `PLAQUES_DB_PATH` is unset.
pub const DEFAULT_DB_PATH: &str = "/data/plaques.db";

/// Validated name of the analytic table.
///
/// Only ASCII letters, digits, `_`, `.` and `-` are accepted so the name can
/// be wrapped in backticks without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if valid {
            Ok(Self(name))
        } else {
            Err(Error::InvalidTableName { name })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Project component of a fully-qualified `project.dataset.table` name.
    pub fn project(&self) -> Option<&str> {
        let mut parts = self.0.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(project), Some(_), Some(_), None) => Some(project),
            _ => None,
        }
    }

    /// Identifier quoted for use in a `FROM` clause.
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which analytic backend to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Local SQLite extract of the table.
    Sqlite { path: PathBuf },
    /// Google BigQuery via the REST API.
    BigQuery {
        project: String,
        location: Option<String>,
        access_token: Option<String>,
    },
}

/// Complete store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub table: TableName,
    pub backend: BackendConfig,
}

impl StoreConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let table =
            TableName::new(get("PLAQUES_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()))?;

        let backend = match get("PLAQUES_BACKEND")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("sqlite") => BackendConfig::Sqlite {
                path: PathBuf::from(
                    get("PLAQUES_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                ),
            },
            Some("bigquery") => {
                let project = get("BIGQUERY_PROJECT")
                    .or_else(|| table.project().map(str::to_string))
                    .ok_or_else(|| Error::Config {
                        message: "BIGQUERY_PROJECT is required unless PLAQUES_TABLE is \
                                  project-qualified"
                            .to_string(),
                    })?;
                BackendConfig::BigQuery {
                    project,
                    location: get("BIGQUERY_LOCATION"),
                    access_token: get("BIGQUERY_ACCESS_TOKEN"),
                }
            }
            Some(other) => {
                return Err(Error::Config {
                    message: format!(
                        "unknown PLAQUES_BACKEND '{}'; expected sqlite or bigquery",
                        other
                    ),
                })
            }
        };

        Ok(Self { table, backend })
    }

    /// Short backend label for logs.
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            BackendConfig::Sqlite { .. } => "sqlite",
            BackendConfig::BigQuery { .. } => "bigquery",
        }
    }
}
