//! Analytics Module
//!
//! 季節予測・異常検知システム

pub mod anomaly;
pub mod config;
pub mod prediction;

pub use anomaly::{
    detect_anomalies, AnomalyRecord, AnomalyType, DetectionReport, HybridAnomalyDetector,
    Severity,
};
pub use config::{
    Contamination, DetectionConfig, ForecastConfig, ForecastScope, OutlierConfig,
    SeasonalityConfig, SeverityPolicy,
};
pub use prediction::{ForecastPoint, SeasonalForecaster};
