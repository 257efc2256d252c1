//! Hybrid Anomaly Detector
//!
//! 季節予測区間と Isolation Forest を組み合わせた検知パス。
//! 呼び出しごとに両モデルを再学習し、状態は保持しない。

use super::outlier::OutlierDetector;
use super::reducer::AnomalyReducer;
use super::types::{ChartPoint, DetectionReport};
use crate::analytics::config::DetectionConfig;
use crate::analytics::prediction::SeasonalForecaster;
use crate::error::{Error, Result};
use crate::ingest::{to_iso8601, NormalizedRecord};
use std::time::Instant;
use tracing::{debug, info};

/// ハイブリッド異常検知器
#[derive(Debug, Clone, Default)]
pub struct HybridAnomalyDetector {
    config: DetectionConfig,
}

impl HybridAnomalyDetector {
    /// 設定を検証して作成
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// 正規化済みレコードに対して検知を実行
    pub fn detect(&self, records: &[NormalizedRecord]) -> Result<DetectionReport> {
        if records.is_empty() {
            return Err(Error::InsufficientData(
                "no records to analyze".to_string(),
            ));
        }

        let started = Instant::now();

        let forecaster = SeasonalForecaster::new(self.config.forecast.clone())?;
        let forecasts = forecaster.forecast_records(records)?;
        let labels = OutlierDetector::new(self.config.outlier.clone()).detect(records)?;
        let anomalies = AnomalyReducer::new(self.config.severity).reduce(records, &forecasts, &labels)?;

        let chart_data = records
            .iter()
            .map(|record| ChartPoint {
                timestamp: to_iso8601(&record.timestamp),
                traffic_volume: record.traffic_volume,
            })
            .collect();

        debug!(
            "Detection pass took {:?} for {} records",
            started.elapsed(),
            records.len()
        );
        info!(
            "Detected {} anomalies in {} records",
            anomalies.len(),
            records.len()
        );

        Ok(DetectionReport {
            anomalies,
            chart_data,
        })
    }
}

/// 設定を指定して1回の検知パスを実行
pub fn detect_anomalies(
    records: &[NormalizedRecord],
    config: &DetectionConfig,
) -> Result<DetectionReport> {
    HybridAnomalyDetector::new(config.clone())?.detect(records)
}
