//! Parameterized SQL for the plaque endpoints.
//!
//! Every value derived from a request is bound as a named `@parameter`; only
//! the validated [`TableName`] is interpolated into the statement text. The
//! generated SQL is valid for both GoogleSQL (BigQuery) and SQLite, with the
//! substring test selected per [`Dialect`].

use std::fmt;

use crate::config::TableName;

/// Unicode-aware lowercase function registered on every SQLite connection.
/// The built-in `LOWER()` only folds ASCII.
pub const SQLITE_LOWER_FN: &str = "unicode_lower";

/// SQL flavour of the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    BigQuery,
    Sqlite,
}

impl Dialect {
    /// Case-insensitive substring test of `column` against an already
    /// lowercased parameter.
    fn contains(self, column: &str, param: &str) -> String {
        match self {
            Dialect::BigQuery => format!("STRPOS(LOWER({}), @{}) > 0", column, param),
            Dialect::Sqlite => {
                format!("INSTR({}({}), @{}) > 0", SQLITE_LOWER_FN, column, param)
            }
        }
    }
}

/// Typed value bound to a named query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    String(String),
    Int64(i64),
    Float64(f64),
}

impl Param {
    /// BigQuery parameter type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Param::String(_) => "STRING",
            Param::Int64(_) => "INT64",
            Param::Float64(_) => "FLOAT64",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::String(s) => f.write_str(s),
            Param::Int64(v) => write!(f, "{}", v),
            Param::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// A SQL statement plus its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<(String, Param)>,
}

impl Query {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    fn bind(mut self, name: &str, value: Param) -> Self {
        self.params.push((name.to_string(), value));
        self
    }

    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// Geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBounds {
    /// True when the box spans the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }
}

/// Row filters shared by the list and search endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Filter {
    pub min_confidence: Option<f64>,
    pub bbox: Option<GeoBounds>,
}

/// Result window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

const EFFECTIVE_LAT: &str = "COALESCE(projected_latitude, latitude)";
const EFFECTIVE_LON: &str = "COALESCE(projected_longitude, longitude)";

/// Accumulates `WHERE` conditions and their bindings.
struct Conditions {
    clauses: Vec<String>,
    params: Vec<(String, Param)>,
}

impl Conditions {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, clause: String, binds: impl IntoIterator<Item = (&'static str, Param)>) {
        self.clauses.push(clause);
        self.params
            .extend(binds.into_iter().map(|(n, v)| (n.to_string(), v)));
    }

    fn with_filter(mut self, filter: &Filter) -> Self {
        if let Some(min) = filter.min_confidence {
            self.push(
                "confidence >= @min_confidence".to_string(),
                [("min_confidence", Param::Float64(min))],
            );
        }

        if let Some(bbox) = filter.bbox {
            self.push(
                format!("{} BETWEEN @south AND @north", EFFECTIVE_LAT),
                [
                    ("south", Param::Float64(bbox.south)),
                    ("north", Param::Float64(bbox.north)),
                ],
            );
            let lon_clause = if bbox.crosses_antimeridian() {
                format!("({0} >= @west OR {0} <= @east)", EFFECTIVE_LON)
            } else {
                format!("{} BETWEEN @west AND @east", EFFECTIVE_LON)
            };
            self.push(
                lon_clause,
                [
                    ("west", Param::Float64(bbox.west)),
                    ("east", Param::Float64(bbox.east)),
                ],
            );
        }

        self
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn into_query(self, head: &str, tail: &str) -> Query {
        let mut query = Query::new(format!("{}{}{}", head, self.where_clause(), tail));
        query.params = self.params;
        query
    }
}

fn paged(query: Query, page: Page) -> Query {
    query
        .bind("limit", Param::Int64(i64::from(page.limit)))
        .bind("offset", Param::Int64(i64::from(page.offset)))
}

/// Cheap statement used by readiness probes to confirm the table is reachable.
pub fn probe_query(table: &TableName) -> Query {
    Query::new(format!("SELECT id FROM {} LIMIT 1", table.quoted()))
}

/// Fetch a single plaque by identifier.
pub fn detail_query(table: &TableName, id: &str) -> Query {
    Query::new(format!(
        "SELECT * FROM {} WHERE id = @id LIMIT 1",
        table.quoted()
    ))
    .bind("id", Param::String(id.to_string()))
}

/// Count the rows matching `filter`, returned in a `total` column.
pub fn count_query(table: &TableName, filter: &Filter) -> Query {
    Conditions::new()
        .with_filter(filter)
        .into_query(&format!("SELECT COUNT(*) AS total FROM {}", table.quoted()), "")
}

/// Page through plaques by descending confidence.
pub fn list_query(table: &TableName, filter: &Filter, page: Page) -> Query {
    let query = Conditions::new().with_filter(filter).into_query(
        &format!("SELECT * FROM {}", table.quoted()),
        " ORDER BY confidence DESC LIMIT @limit OFFSET @offset",
    );
    paged(query, page)
}

/// Case-insensitive substring search on the recognized text.
pub fn search_query(
    dialect: Dialect,
    table: &TableName,
    text: &str,
    filter: &Filter,
    page: Page,
) -> Query {
    let mut conditions = Conditions::new();
    conditions.push(
        dialect.contains("text", "text"),
        [("text", Param::String(text.to_lowercase()))],
    );
    let query = conditions.with_filter(filter).into_query(
        &format!("SELECT * FROM {}", table.quoted()),
        " ORDER BY confidence DESC LIMIT @limit OFFSET @offset",
    );
    paged(query, page)
}
