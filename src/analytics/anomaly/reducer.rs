//! Anomaly Reducer
//!
//! 予測区間判定と外れ値ラベルを OR で統合し、異常レコードを生成する

use super::types::{AnomalyRecord, AnomalyType, OutlierLabel, Severity};
use crate::analytics::config::SeverityPolicy;
use crate::analytics::prediction::ForecastPoint;
use crate::error::{Error, Result};
use crate::ingest::{to_iso8601, NormalizedRecord};

/// 区間半幅に対する逸脱比率の閾値
const HIGH_DEVIATION_RATIO: f64 = 1.0;
const MEDIUM_DEVIATION_RATIO: f64 = 0.25;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyReducer {
    severity: SeverityPolicy,
}

impl AnomalyReducer {
    pub fn new(severity: SeverityPolicy) -> Self {
        Self { severity }
    }

    /// 行ごとの判定を異常リストに変換（入力順を保持）
    pub fn reduce(
        &self,
        records: &[NormalizedRecord],
        forecasts: &[ForecastPoint],
        labels: &[OutlierLabel],
    ) -> Result<Vec<AnomalyRecord>> {
        if records.len() != forecasts.len() || records.len() != labels.len() {
            return Err(Error::Internal(format!(
                "misaligned detector output: {} records, {} forecasts, {} labels",
                records.len(),
                forecasts.len(),
                labels.len()
            )));
        }

        Ok(records
            .iter()
            .zip(forecasts)
            .zip(labels)
            .filter_map(|((record, forecast), label)| {
                let temporal = forecast.is_outside(record.traffic_volume);
                if !temporal && !label.is_outlier() {
                    return None;
                }

                let anomaly_type = if temporal {
                    AnomalyType::TemporalShift
                } else {
                    AnomalyType::TrafficSpikeOrDrop
                };

                Some(AnomalyRecord {
                    base_station_id: record.station_id.clone(),
                    anomaly_type,
                    timestamp: to_iso8601(&record.timestamp),
                    severity: self.severity_for(record.traffic_volume, forecast),
                    details: format!(
                        "Observed: {:.2}, Expected Range: [{:.2}, {:.2}]",
                        record.traffic_volume, forecast.yhat_lower, forecast.yhat_upper
                    ),
                })
            })
            .collect())
    }

    fn severity_for(&self, value: f64, forecast: &ForecastPoint) -> Severity {
        match self.severity {
            SeverityPolicy::Fixed { level } => level,
            SeverityPolicy::DeviationRatio => {
                let excess = forecast.excess(value);
                if excess <= 0.0 {
                    return Severity::Low;
                }
                let half_width = forecast.half_width();
                let ratio = if half_width > 0.0 {
                    excess / half_width
                } else {
                    f64::INFINITY
                };
                if ratio >= HIGH_DEVIATION_RATIO {
                    Severity::High
                } else if ratio >= MEDIUM_DEVIATION_RATIO {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            }
        }
    }
}
