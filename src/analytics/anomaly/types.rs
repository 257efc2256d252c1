//! Anomaly Detection Types
//!
//! 異常検知用の型定義

use crate::ingest::StationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 異常の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    /// 季節予測区間からの逸脱
    #[serde(rename = "Temporal Shift")]
    TemporalShift,
    /// Isolation Forest による外れ値
    #[serde(rename = "Unusual Traffic Spike/Drop")]
    TrafficSpikeOrDrop,
}

impl AnomalyType {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyType::TemporalShift => "Temporal Shift",
            AnomalyType::TrafficSpikeOrDrop => "Unusual Traffic Spike/Drop",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 重大度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => f.write_str("low"),
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
        }
    }
}

/// Isolation Forest のラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierLabel {
    Inlier,
    Outlier,
}

impl OutlierLabel {
    pub fn is_outlier(&self) -> bool {
        matches!(self, OutlierLabel::Outlier)
    }
}

/// 異常レコード（検知パスの最終成果物）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// 基地局ID
    pub base_station_id: StationId,
    /// 異常の種類
    pub anomaly_type: AnomalyType,
    /// ISO-8601 タイムスタンプ
    pub timestamp: String,
    /// 重大度
    pub severity: Severity,
    /// 説明
    pub details: String,
}

/// チャート用の系列点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: String,
    pub traffic_volume: f64,
}

/// 検知結果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionReport {
    pub anomalies: Vec<AnomalyRecord>,
    #[serde(rename = "chartData")]
    pub chart_data: Vec<ChartPoint>,
}

impl DetectionReport {
    /// 重大度ごとの件数
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.anomalies
            .iter()
            .filter(|a| a.severity == severity)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_record_json_shape() {
        let record = AnomalyRecord {
            base_station_id: StationId::Numeric(12),
            anomaly_type: AnomalyType::TrafficSpikeOrDrop,
            timestamp: "2024-01-01T03:00:00".to_string(),
            severity: Severity::High,
            details: "Observed: 1.00, Expected Range: [0.00, 2.00]".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["base_station_id"], 12);
        assert_eq!(json["anomaly_type"], "Unusual Traffic Spike/Drop");
        assert_eq!(json["severity"], "high");

        let back: AnomalyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_outlier_label() {
        assert!(!OutlierLabel::Inlier.is_outlier());
        assert!(OutlierLabel::Outlier.is_outlier());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
