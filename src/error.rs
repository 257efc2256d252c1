//! Error types for the NetGuard detection pipeline.

use thiserror::Error;

/// Result type alias for NetGuard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for loading, detection and alerting
#[derive(Debug, Error)]
pub enum Error {
    /// Required canonical columns are missing after column mapping
    #[error("Schema error: missing required columns {missing:?} (found: {found:?})")]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// A row could not be parsed into a normalized record
    #[error("Parse error at row {row}, column '{column}': {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    /// The uploaded payload could not be read as CSV or JSON
    #[error("Load error: {0}")]
    Load(String),

    /// Not enough data to run detection
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Analysis exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Upstream alerting service failed after all retry attempts
    #[error("Upstream error after {attempts} attempt(s): {message}")]
    Upstream { attempts: u32, message: String },

    /// Upstream responded with a non-success status
    #[error("Upstream returned HTTP {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Alert delivery failure
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 一時的な障害（リトライ対象）かどうか
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            Error::Timeout(_) => true,
            _ => false,
        }
    }

    /// Map error to an HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Schema { .. } | Error::Parse { .. } | Error::Load(_) => 400,
            Error::InvalidInput(_) => 400,
            Error::InsufficientData(_) => 422,
            Error::Timeout(_) => 504,
            Error::Upstream { .. } | Error::UpstreamStatus { .. } | Error::Network(_) => 502,
            Error::Config(_) => 503,
            _ => 500,
        }
    }

    pub(crate) fn parse(row: usize, column: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_columns() {
        let err = Error::Schema {
            missing: vec!["traffic_volume".to_string()],
            found: vec!["timestamp".to_string(), "cell_id".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("traffic_volume"));
        assert!(message.contains("cell_id"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_transient_classification() {
        let server_error = Error::UpstreamStatus {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server_error.is_transient());

        let not_found = Error::UpstreamStatus {
            status: 404,
            message: "missing".to_string(),
        };
        assert!(!not_found.is_transient());
        assert!(!Error::InvalidInput("bad".to_string()).is_transient());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InsufficientData("empty".into()).status_code(), 422);
        assert_eq!(Error::Timeout("slow".into()).status_code(), 504);
        assert_eq!(
            Error::Upstream {
                attempts: 3,
                message: "down".into()
            }
            .status_code(),
            502
        );
    }
}
