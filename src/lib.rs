//! # netguard
//!
//! Cellular base-station traffic anomaly detection.
//!
//! A detection pass fits a seasonal forecast (piecewise-linear trend with daily and
//! weekly Fourier terms) and a seeded isolation forest over one batch of traffic
//! observations, then merges both signals into an ordered list of anomalies with a
//! severity and a human-readable explanation. The same pass backs the `netguard`
//! command line and the HTTP API; alerts are rendered as HTML and handed to a
//! pluggable transport.

pub mod alerting;
pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod http_server;
pub mod ingest;
pub mod logging;
pub mod retry;
pub mod service;

pub use analytics::{detect_anomalies, AnomalyRecord, DetectionConfig, DetectionReport};
pub use error::{Error, Result};
pub use service::AnalysisService;
