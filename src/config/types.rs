use crate::analytics::DetectionConfig;
use crate::ingest::ColumnMapping;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetGuardConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Detection pass configuration
    pub detection: DetectionConfig,

    /// Accepted source column names
    pub columns: ColumnMapping,

    /// Alert delivery configuration
    pub alerting: AlertingConfig,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Server-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_addr: String,

    /// Deadline for one analysis in seconds
    pub analysis_timeout_secs: u64,

    /// Maximum upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            analysis_timeout_secs: 60,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Alert transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Record alerts in the log
    #[default]
    Log,
    /// POST alerts to `webhook_url`
    Webhook,
}

/// Alert delivery configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Default recipient for analysis alerts
    pub recipient: Option<String>,

    /// Delivery transport
    pub transport: TransportKind,

    /// Target URL for the webhook transport
    pub webhook_url: Option<String>,

    /// External alerting service queried by the report endpoint
    pub upstream_url: Option<String>,

    /// Retry policy for the upstream fetch
    pub retry: RetryConfig,
}

/// Log rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level or filter directive (error, warn, info, debug, trace)
    pub level: String,

    /// Write logs to stderr
    pub console: bool,

    /// Write logs to a rolling file
    pub file: bool,

    /// Log file directory
    pub log_dir: Option<PathBuf>,

    /// File rotation
    pub rotation: RotationStrategy,

    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: false,
            log_dir: None,
            rotation: RotationStrategy::Daily,
            json: false,
        }
    }
}
