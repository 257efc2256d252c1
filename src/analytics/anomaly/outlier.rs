//! Multivariate Outlier Detection
//!
//! `{traffic_volume, hour}` を標準化して Isolation Forest にかける

use super::isolation::IsolationForest;
use super::types::OutlierLabel;
use crate::analytics::config::OutlierConfig;
use crate::error::{Error, Result};
use crate::ingest::NormalizedRecord;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// 列ごとの標準化（母標準偏差、分散ゼロの列は中心化のみ）
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InsufficientData("cannot scale an empty matrix".to_string()))?;
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }
}

/// 外れ値検知器
#[derive(Debug, Clone, Default)]
pub struct OutlierDetector {
    config: OutlierConfig,
}

impl OutlierDetector {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutlierConfig {
        &self.config
    }

    /// 特徴量行列 `[traffic_volume, hour]`
    pub fn features(records: &[NormalizedRecord]) -> Array2<f64> {
        let mut features = Array2::<f64>::zeros((records.len(), 2));
        for (i, record) in records.iter().enumerate() {
            features[[i, 0]] = record.traffic_volume;
            features[[i, 1]] = f64::from(record.hour);
        }
        features
    }

    /// 行ごとのラベルを返す（入力順）
    pub fn detect(&self, records: &[NormalizedRecord]) -> Result<Vec<OutlierLabel>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // トラフィック量が一定なら外れ値なし
        let first = records[0].traffic_volume;
        if records.iter().all(|r| r.traffic_volume == first) {
            debug!("Outlier detection skipped: constant traffic volume");
            return Ok(vec![OutlierLabel::Inlier; records.len()]);
        }

        let features = Self::features(records);
        let scaled = StandardScaler::fit(&features)?.transform(&features);

        let mut forest = IsolationForest::new()
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.max_samples)
            .with_contamination(self.config.contamination)
            .with_random_state(self.config.random_seed);
        let forest_labels = forest.fit_predict(scaled.view())?;
        let isolated = forest_labels.iter().filter(|l| l.is_outlier()).count();
        let labels = confirm_by_volume(records, forest_labels);

        debug!(
            "Outlier detection: {} of {} rows flagged ({} isolated by the forest)",
            labels.iter().filter(|l| l.is_outlier()).count(),
            labels.len(),
            isolated
        );
        Ok(labels)
    }
}

/// 正常行のトラフィック量の範囲
#[derive(Debug, Clone, Copy)]
struct VolumeBand {
    lo: f64,
    hi: f64,
}

impl VolumeBand {
    fn point(volume: f64) -> Self {
        Self {
            lo: volume,
            hi: volume,
        }
    }

    fn include(self, volume: f64) -> Self {
        Self {
            lo: self.lo.min(volume),
            hi: self.hi.max(volume),
        }
    }

    fn contains(&self, volume: f64, tolerance: f64) -> bool {
        volume >= self.lo - tolerance && volume <= self.hi + tolerance
    }
}

/// 時間帯だけで分離された行を正常に戻す
///
/// 森が外れ値とした行でも、同じ時間帯の正常行（なければ全正常行）の量の範囲に
/// 正常行の母標準偏差を足した帯に収まる場合は外れ値としない。
fn confirm_by_volume(records: &[NormalizedRecord], labels: Vec<OutlierLabel>) -> Vec<OutlierLabel> {
    let mut global: Option<VolumeBand> = None;
    let mut by_hour: [Option<VolumeBand>; 24] = [None; 24];
    let mut inlier_volumes = Vec::new();

    for (record, label) in records.iter().zip(&labels) {
        if label.is_outlier() {
            continue;
        }
        let volume = record.traffic_volume;
        inlier_volumes.push(volume);
        global = Some(global.map_or(VolumeBand::point(volume), |b| b.include(volume)));
        let slot = &mut by_hour[record.hour as usize % 24];
        *slot = Some(slot.map_or(VolumeBand::point(volume), |b| b.include(volume)));
    }

    // 全行が外れ値なら比較対象がない
    let Some(global) = global else {
        return labels;
    };
    let tolerance = Array1::from_vec(inlier_volumes).std(0.0);

    records
        .iter()
        .zip(labels)
        .map(|(record, label)| {
            if !label.is_outlier() {
                return label;
            }
            let band = by_hour[record.hour as usize % 24].unwrap_or(global);
            if band.contains(record.traffic_volume, tolerance) {
                OutlierLabel::Inlier
            } else {
                OutlierLabel::Outlier
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StationId;
    use chrono::{Duration, NaiveDate};
    use ndarray::array;

    fn hourly(values: &[f64]) -> Vec<NormalizedRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                NormalizedRecord::new(start + Duration::hours(i as i64), StationId::Numeric(1), *v)
            })
            .collect()
    }

    #[test]
    fn test_standard_scaler() {
        let data = array![[1.0, 5.0], [3.0, 5.0]];
        let scaled = StandardScaler::fit(&data).unwrap().transform(&data);
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_constant_traffic_has_no_outliers() {
        let records = hourly(&[10.0; 48]);
        let labels = OutlierDetector::default().detect(&records).unwrap();
        assert_eq!(labels.len(), 48);
        assert!(labels.iter().all(|l| !l.is_outlier()));
    }

    #[test]
    fn test_spike_is_outlier() {
        let mut values = vec![10.0; 48];
        values[20] = 1000.0;
        let labels = OutlierDetector::default().detect(&hourly(&values)).unwrap();
        assert_eq!(labels[20], OutlierLabel::Outlier);
    }

    #[test]
    fn test_only_the_deviating_row_is_outlier() {
        for days in [2usize, 3, 7, 14, 21] {
            let mut values = vec![20.0; days * 24];
            values[17] = 2000.0;
            let labels = OutlierDetector::default().detect(&hourly(&values)).unwrap();

            let flagged: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| l.is_outlier())
                .map(|(i, _)| i)
                .collect();
            assert_eq!(flagged, vec![17], "{} days", days);
        }
    }

    #[test]
    fn test_regular_daily_pattern_stays_inlier() {
        // 日中 80、夜間 10 のパターンで、日中の1行だけが夜間並みに落ちる
        let mut values: Vec<f64> = (0..24 * 4)
            .map(|h| if (8..20).contains(&(h % 24)) { 80.0 } else { 10.0 })
            .collect();
        values[24 + 12] = 10.0;
        let labels = OutlierDetector::default().detect(&hourly(&values)).unwrap();

        assert!(labels
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 36)
            .all(|(_, l)| !l.is_outlier()));
    }

    #[test]
    fn test_confirm_by_volume_keeps_out_of_band_rows() {
        let records = hourly(&[10.0, 10.0, 10.0, 50.0]);
        let labels = vec![
            OutlierLabel::Outlier,
            OutlierLabel::Inlier,
            OutlierLabel::Inlier,
            OutlierLabel::Outlier,
        ];
        assert_eq!(
            confirm_by_volume(&records, labels),
            vec![
                OutlierLabel::Inlier,
                OutlierLabel::Inlier,
                OutlierLabel::Inlier,
                OutlierLabel::Outlier,
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(OutlierDetector::default().detect(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_features_layout() {
        let records = hourly(&[1.0, 2.0]);
        let features = OutlierDetector::features(&records);
        assert_eq!(features, array![[1.0, 0.0], [2.0, 1.0]]);
    }
}
