//! Anomaly Detection Module
//!
//! 異常検知システム（季節予測区間 + Isolation Forest）

mod detector;
pub mod isolation;
mod outlier;
mod reducer;
mod types;

pub use detector::{detect_anomalies, HybridAnomalyDetector};
pub use isolation::IsolationForest;
pub use outlier::{OutlierDetector, StandardScaler};
pub use reducer::AnomalyReducer;
pub use types::{AnomalyRecord, AnomalyType, ChartPoint, DetectionReport, OutlierLabel, Severity};
