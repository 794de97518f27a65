//! SQLite backend over a local extract of the plaques table.

use std::path::Path;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::query::{Param, Query, SQLITE_LOWER_FN};
use crate::record::Row;

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Param::String(s) => ToSqlOutput::from(s.as_str()),
            Param::Int64(v) => ToSqlOutput::from(*v),
            Param::Float64(v) => ToSqlOutput::from(*v),
        })
    }
}

/// Read-only SQLite store.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex and every statement runs on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config {
                message: format!("sqlite database not found: {}", path.display()),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, e.g. an in-memory fixture, and register
    /// the functions the generated SQL relies on.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let conn = Arc::clone(&self.conn);
        let query = query.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            run_query(&conn, &query)
        })
        .await?
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// Install `unicode_lower(text)` on `conn`.
pub(crate) fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        SQLITE_LOWER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        unicode_lower,
    )
}

/// NULL and blobs stay NULL; numbers are lowercased as their text form.
fn unicode_lower(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match ctx.get_raw(0) {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_lowercase()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

/// Execute `query` synchronously and collect rows as column maps.
pub(crate) fn run_query(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let names: Vec<String> = query.params.iter().map(|(n, _)| format!("@{}", n)).collect();
    let params: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .zip(query.params.iter())
        .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut rows = stmt.query(params.as_slice())?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            map.insert(column.clone(), to_json(row.get_ref(idx)?));
        }
        out.push(map);
    }

    debug!(rows = out.len(), "sqlite query complete");
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(STANDARD.encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableName;
    use crate::query::{detail_query, list_query, search_query, Dialect, Filter, Page};

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE plaques (id TEXT NOT NULL, text TEXT, confidence REAL, thumb BLOB);
             INSERT INTO plaques VALUES ('a', 'Hier woonde Anne', 0.9, X'0102');
             INSERT INTO plaques VALUES ('b', 'Gebouwd 1650', 0.4, NULL);
             INSERT INTO plaques VALUES ('c', NULL, NULL, NULL);
             INSERT INTO plaques VALUES ('d', 'HIER WOONDE ÉMILE ZOLA', 0.7, NULL);",
        )
        .unwrap();
        register_functions(&conn).unwrap();
        conn
    }

    fn table() -> TableName {
        TableName::new("plaques").unwrap()
    }

    #[test]
    fn test_detail_binds_named_parameter() {
        let conn = store();
        let rows = run_query(&conn, &detail_query(&table(), "a")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["text"], "Hier woonde Anne");
        assert_eq!(rows[0]["thumb"], "AQI=");
    }

    #[test]
    fn test_injection_attempt_matches_nothing() {
        let conn = store();
        let rows = run_query(&conn, &detail_query(&table(), "a' OR '1'='1")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_list_orders_by_confidence_desc() {
        let conn = store();
        let rows = run_query(&conn, &list_query(&table(), &Filter::default(), Page::default()))
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "d", "b", "c"]);
        assert!(rows[2]["confidence"].is_null());
    }

    #[test]
    fn test_search_is_case_insensitive_and_literal() {
        let conn = store();
        let rows = run_query(
            &conn,
            &search_query(Dialect::Sqlite, &table(), "anne", &Filter::default(), Page::default()),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);

        let rows = run_query(
            &conn,
            &search_query(Dialect::Sqlite, &table(), "WOONDE", &Filter::default(), Page::default()),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = run_query(
            &conn,
            &search_query(Dialect::Sqlite, &table(), "%", &Filter::default(), Page::default()),
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let conn = store();
        let rows = run_query(
            &conn,
            &search_query(Dialect::Sqlite, &table(), "émile", &Filter::default(), Page::default()),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "d");
    }

    #[test]
    fn test_unicode_lower_keeps_nulls() {
        let conn = store();
        let lowered: Option<String> = conn
            .query_row("SELECT unicode_lower(text) FROM plaques WHERE id = 'c'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(lowered, None);
        let lowered: String = conn
            .query_row("SELECT unicode_lower('ÉMILE')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lowered, "émile");
    }

    #[tokio::test]
    async fn test_async_query_runs_on_blocking_pool() {
        let store = SqliteStore::from_connection(store()).unwrap();
        let rows = store.query(&detail_query(&table(), "b")).await.unwrap();
        assert_eq!(rows[0]["confidence"], 0.4);
    }

    #[test]
    fn test_open_missing_file() {
        let err = SqliteStore::open(Path::new("/nonexistent/plaques.db")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
