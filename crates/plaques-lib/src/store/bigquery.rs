//! BigQuery backend using the v2 REST API.
//!
//! Queries are submitted through `jobs.query` with named parameters. When the
//! job does not finish within the request timeout, or the result spans more
//! than one page, `jobs.getQueryResults` is polled until the job completes and
//! every page has been read.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::query::Query;
use crate::record::Row;

/// Default REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// GCE/Cloud Run metadata endpoint for the default service account token.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Server-side wait per request before BigQuery answers with `jobComplete: false`.
const QUERY_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on `getQueryResults` calls for a single query.
const MAX_POLLS: usize = 30;

/// BigQuery REST client bound to one billing project.
#[derive(Debug, Clone)]
pub struct BigQueryStore {
    http: reqwest::Client,
    base_url: String,
    project: String,
    location: Option<String>,
    access_token: Option<String>,
}

impl BigQueryStore {
    /// Build a client for `project`. Without `access_token` every query
    /// fetches one from the metadata server.
    pub fn new(
        project: impl Into<String>,
        location: Option<String>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(QUERY_TIMEOUT_MS + 20_000))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.into(),
            location,
            access_token,
        })
    }

    /// Point the client at a different API root (emulators, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Run `query` and return every result row.
    pub async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let token = self.token().await?;
        let url = format!("{}/projects/{}/queries", self.base_url, self.project);
        let body = QueryRequest::new(query, self.location.clone(), false);

        debug!(project = %self.project, sql = %query.sql, "submitting bigquery job");
        let mut response: QueryResponse =
            self.send(self.http.post(&url).json(&body), &token).await?;

        let mut rows = Vec::new();
        let mut polls = 0;
        loop {
            if let Some(errors) = response.errors.as_ref().filter(|e| !e.is_empty()) {
                return Err(Error::BigQuery {
                    message: errors
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; "),
                });
            }

            if response.job_complete {
                let schema = response.schema.as_ref().ok_or_else(|| Error::BigQuery {
                    message: "completed job returned no schema".to_string(),
                })?;
                for raw in response.rows.iter().flatten() {
                    rows.push(decode_row(&schema.fields, raw)?);
                }
                if response.page_token.is_none() {
                    break;
                }
            }

            polls += 1;
            if polls > MAX_POLLS {
                return Err(Error::BigQuery {
                    message: format!("query did not complete after {} polls", MAX_POLLS),
                });
            }

            let job = response.job_reference.as_ref().ok_or_else(|| Error::BigQuery {
                message: "response is missing jobReference".to_string(),
            })?;
            let page_token = if response.job_complete {
                response.page_token.clone()
            } else {
                None
            };
            response = self.get_results(job, page_token.as_deref(), &token).await?;
        }

        debug!(rows = rows.len(), polls = polls, "bigquery query complete");
        Ok(rows)
    }

    /// Validate `query` with a dry run; no bytes are billed.
    pub async fn dry_run(&self, query: &Query) -> Result<()> {
        let token = self.token().await?;
        let url = format!("{}/projects/{}/queries", self.base_url, self.project);
        let body = QueryRequest::new(query, self.location.clone(), true);
        let _: QueryResponse = self.send(self.http.post(&url).json(&body), &token).await?;
        Ok(())
    }

    async fn get_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
        token: &str,
    ) -> Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        );
        let mut params: Vec<(&str, String)> = vec![
            ("timeoutMs", QUERY_TIMEOUT_MS.to_string()),
            ("formatOptions.useInt64Timestamp", "true".to_string()),
        ];
        if let Some(location) = job.location.as_ref().or(self.location.as_ref()) {
            params.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }
        self.send(self.http.get(&url).query(&params), token).await
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> Result<T> {
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::BigQuery {
                message: format!("HTTP {}: {}", status.as_u16(), message),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Auth {
                message: format!("metadata server unreachable: {}", e),
            })?;
        if !response.status().is_success() {
            return Err(Error::Auth {
                message: format!(
                    "metadata server returned HTTP {}",
                    response.status().as_u16()
                ),
            });
        }
        let token: MetadataToken = response.json().await.map_err(|e| Error::Auth {
            message: e.to_string(),
        })?;
        Ok(token.access_token)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<QueryParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    timeout_ms: u64,
    dry_run: bool,
    format_options: FormatOptions,
}

impl QueryRequest {
    fn new(query: &Query, location: Option<String>, dry_run: bool) -> Self {
        Self {
            query: query.sql.clone(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query
                .params
                .iter()
                .map(|(name, value)| QueryParameter {
                    name: name.clone(),
                    parameter_type: ParameterType {
                        type_: value.type_name(),
                    },
                    parameter_value: ParameterValue {
                        value: value.to_string(),
                    },
                })
                .collect(),
            location,
            timeout_ms: QUERY_TIMEOUT_MS,
            dry_run,
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatOptions {
    use_int64_timestamp: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    job_reference: Option<JobReference>,
    page_token: Option<String>,
    rows: Option<Vec<RawRow>>,
    errors: Option<Vec<ErrorProto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRow {
    #[serde(default)]
    f: Vec<RawCell>,
}

#[derive(Debug, Deserialize)]
struct RawCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorProto,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

// =============================================================================
// Row decoding
// =============================================================================

/// Convert a positional `{"f": [{"v": ...}]}` row into a column map.
pub(crate) fn decode_row(fields: &[FieldSchema], raw: &RawRow) -> Result<Row> {
    if raw.f.len() != fields.len() {
        return Err(Error::BigQuery {
            message: format!(
                "row has {} cells but schema has {} fields",
                raw.f.len(),
                fields.len()
            ),
        });
    }

    let mut row = Row::new();
    for (field, cell) in fields.iter().zip(&raw.f) {
        row.insert(field.name.clone(), decode_field(field, &cell.v));
    }
    Ok(row)
}

fn decode_field(field: &FieldSchema, value: &Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| decode_scalar(field, item.get("v").unwrap_or(&Value::Null)))
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        };
    }
    decode_scalar(field, value)
}

fn decode_scalar(field: &FieldSchema, value: &Value) -> Value {
    let raw = match value {
        Value::Null => return Value::Null,
        Value::String(s) => s.as_str(),
        Value::Object(_) if matches!(field.type_.as_str(), "RECORD" | "STRUCT") => {
            let nested: Option<RawRow> = serde_json::from_value(value.clone()).ok();
            return nested
                .and_then(|row| decode_row(&field.fields, &row).ok())
                .map(Value::Object)
                .unwrap_or(Value::Null);
        }
        other => return other.clone(),
    };

    match field.type_.as_str() {
        "INTEGER" | "INT64" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        "BOOLEAN" | "BOOL" => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        "TIMESTAMP" => timestamp(raw)
            .map(Value::String)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        "JSON" => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(column = %field.name, error = %e, "unparsable JSON column");
            Value::String(raw.to_string())
        }),
        _ => Value::String(raw.to_string()),
    }
}

/// Render an epoch timestamp as RFC 3339.
///
/// Accepts integer microseconds (`useInt64Timestamp`) or floating seconds.
fn timestamp(raw: &str) -> Option<String> {
    let micros = match raw.parse::<i64>() {
        Ok(micros) => micros,
        Err(_) => {
            let seconds = raw.parse::<f64>().ok()?;
            (seconds * 1_000_000.0).round() as i64
        }
    };
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(micros.div_euclid(1_000_000), nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
