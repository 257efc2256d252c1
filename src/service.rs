//! Analysis Service
//!
//! CLI と HTTP API が共有する唯一の解析エントリポイント。
//! 読み込み → 正規化 → 検知 を1回のパスで行う。

use crate::analytics::{DetectionConfig, DetectionReport, HybridAnomalyDetector};
use crate::error::Result;
use crate::ingest::{load_bytes, load_file, ColumnMapping, DataFormat, Preprocessor, RawTable};
use std::path::Path;
use tracing::info;

/// 解析サービス（状態を持たず、呼び出しごとにモデルを再学習）
#[derive(Debug, Clone, Default)]
pub struct AnalysisService {
    preprocessor: Preprocessor,
    detector: HybridAnomalyDetector,
}

impl AnalysisService {
    /// 列マッピングと検知設定から作成
    pub fn new(mapping: ColumnMapping, detection: DetectionConfig) -> Result<Self> {
        Ok(Self {
            preprocessor: Preprocessor::new(mapping),
            detector: HybridAnomalyDetector::new(detection)?,
        })
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        self.detector.config()
    }

    /// 読み込み済みテーブルを解析
    pub fn analyze_table(&self, table: &RawTable) -> Result<DetectionReport> {
        let records = self.preprocessor.normalize(table)?;
        self.detector.detect(&records)
    }

    /// アップロードされたバイト列を解析
    pub fn analyze_bytes(&self, bytes: &[u8], hint: Option<DataFormat>) -> Result<DetectionReport> {
        let table = load_bytes(bytes, hint)?;
        info!(
            "Loaded {} rows with columns {:?}",
            table.len(),
            table.headers
        );
        self.analyze_table(&table)
    }

    /// ファイルを解析
    pub fn analyze_file(&self, path: &Path) -> Result<DetectionReport> {
        let table = load_file(path)?;
        info!("Loaded {} rows from {}", table.len(), path.display());
        self.analyze_table(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const CSV: &str = "Time,Cell_ID,Total _Traffic(GigaBytes)\n\
        2024-01-01 00:00:00,1,5.0\n\
        2024-01-01 01:00:00,1,5.0\n\
        2024-01-01 02:00:00,1,5.0\n";

    #[test]
    fn test_analyze_bytes_constant() {
        let report = AnalysisService::default()
            .analyze_bytes(CSV.as_bytes(), Some(DataFormat::Csv))
            .unwrap();
        assert!(report.anomalies.is_empty());
        assert_eq!(report.chart_data.len(), 3);
        assert_eq!(report.chart_data[1].timestamp, "2024-01-01T01:00:00");
    }

    #[test]
    fn test_missing_volume_column() {
        let csv = "Time,Cell_ID\n2024-01-01 00:00:00,1\n";
        let result = AnalysisService::default().analyze_bytes(csv.as_bytes(), None);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn test_header_only_csv() {
        let result = AnalysisService::default().analyze_bytes(b"Time,Cell_ID\n", None);
        match result {
            Err(Error::Schema { missing, .. }) => {
                assert_eq!(missing, vec!["traffic_volume".to_string()])
            }
            other => panic!("expected schema error, got {:?}", other),
        }

        let csv = "Time,Cell_ID,Total _Traffic(GigaBytes)\n";
        let result = AnalysisService::default().analyze_bytes(csv.as_bytes(), None);
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_input_table_untouched() {
        let table = load_bytes(CSV.as_bytes(), None).unwrap();
        let before = table.clone();
        AnalysisService::default().analyze_table(&table).unwrap();
        assert_eq!(table, before);
    }
}
