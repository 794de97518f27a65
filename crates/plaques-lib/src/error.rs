use thiserror::Error;

/// Convenient result alias for the plaques library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when the configured table name contains characters that cannot
    /// be safely quoted as an identifier.
    #[error("invalid table name '{name}'; expected [A-Za-z0-9_.-]")]
    InvalidTableName { name: String },

    /// Raised when a result row lacks the mandatory `id` column.
    #[error("result row is missing the 'id' column")]
    MissingId,

    /// Raised when a result row could not be shaped into a plaque.
    #[error("invalid result row: {message}")]
    InvalidRow { message: String },

    /// Raised when the store configuration is incomplete or inconsistent.
    #[error("invalid store configuration: {message}")]
    Config { message: String },

    /// Raised when BigQuery reports a failed query or an unexpected payload.
    #[error("bigquery error: {message}")]
    BigQuery { message: String },

    /// Raised when no access token could be obtained for BigQuery.
    #[error("failed to obtain bigquery access token: {message}")]
    Auth { message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for JSON decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Raised when a blocking query task panicked or was cancelled.
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Short, stable label used for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidTableName { .. } | Error::Config { .. } => "config",
            Error::MissingId | Error::InvalidRow { .. } => "invalid_row",
            Error::BigQuery { .. } => "bigquery",
            Error::Auth { .. } => "auth",
            Error::Sqlite(_) => "sqlite",
            Error::Http(_) => "http",
            Error::Json(_) => "decode",
            Error::Join(_) => "task",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_table_name() {
        let err = Error::InvalidTableName {
            name: "plaques; DROP".to_string(),
        };
        assert!(err.to_string().contains("plaques; DROP"));
    }

    #[test]
    fn test_error_reason_labels() {
        assert_eq!(Error::MissingId.reason(), "invalid_row");
        assert_eq!(
            Error::BigQuery {
                message: "boom".to_string()
            }
            .reason(),
            "bigquery"
        );
        assert_eq!(
            Error::Config {
                message: "x".to_string()
            }
            .reason(),
            "config"
        );
    }
}
