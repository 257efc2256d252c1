//! Seasonal Forecaster
//!
//! 区分線形トレンド＋フーリエ季節項（日次・週次）の加法モデル。
//! 入力バッチに毎回学習し、学習区間内の予測値と予測区間を返す。

use super::linalg::solve_ridge;
use super::types::{ForecastPoint, SeasonalComponent};
use crate::analytics::config::{ForecastConfig, ForecastScope};
use crate::error::{Error, Result};
use crate::ingest::{NormalizedRecord, StationId};
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info, warn};

const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// 単位スケール化した系列に対する基準ノイズ分散
const REFERENCE_NOISE_VARIANCE: f64 = 0.0025;
const TREND_JITTER: f64 = 1e-8;
/// 区間半幅の下限（単位スケール）
const MIN_HALF_WIDTH: f64 = 1e-9;

/// 季節予測器
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    config: ForecastConfig,
    /// 区間幅に対応する標準正規分位点
    z: f64,
}

/// 学習結果の概要
#[derive(Debug, Clone, PartialEq)]
pub enum FitKind {
    /// 回帰モデルを学習
    Model {
        components: Vec<&'static str>,
        changepoints: usize,
        sigma: f64,
    },
    /// データ不足・定数系列のため広い区間を返した
    WideBand { reason: &'static str },
}

impl SeasonalForecaster {
    /// 新しい予測器を作成
    pub fn new(config: ForecastConfig) -> Result<Self> {
        if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
            return Err(Error::Config(format!(
                "interval_width must be in (0, 1), got {}",
                config.interval_width
            )));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|e| Error::Internal(e.to_string()))?;
        let z = normal.inverse_cdf(0.5 + config.interval_width / 2.0);

        Ok(Self { config, z })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// 正規化レコードに対して予測（行順を保持）
    pub fn forecast_records(&self, records: &[NormalizedRecord]) -> Result<Vec<ForecastPoint>> {
        match self.config.scope {
            ForecastScope::Global => {
                let series: Vec<(NaiveDateTime, f64)> = records
                    .iter()
                    .map(|r| (r.timestamp, r.traffic_volume))
                    .collect();
                Ok(self.fit_predict(&series))
            }
            ForecastScope::PerStation => {
                let mut groups: BTreeMap<&StationId, Vec<usize>> = BTreeMap::new();
                for (index, record) in records.iter().enumerate() {
                    groups.entry(&record.station_id).or_default().push(index);
                }

                let mut points: Vec<Option<ForecastPoint>> = vec![None; records.len()];
                for (station, indices) in groups {
                    let series: Vec<(NaiveDateTime, f64)> = indices
                        .iter()
                        .map(|&i| (records[i].timestamp, records[i].traffic_volume))
                        .collect();
                    debug!("Fitting station {} ({} rows)", station, series.len());

                    for (&index, point) in indices.iter().zip(self.fit_predict(&series)) {
                        points[index] = Some(point);
                    }
                }

                points
                    .into_iter()
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| Error::Internal("forecast not aligned with records".to_string()))
            }
        }
    }

    /// 系列を学習して学習区間内の予測を返す（入力順と1対1）
    pub fn fit_predict(&self, series: &[(NaiveDateTime, f64)]) -> Vec<ForecastPoint> {
        self.fit_predict_with_kind(series).0
    }

    /// 予測と学習結果の概要を返す
    pub fn fit_predict_with_kind(
        &self,
        series: &[(NaiveDateTime, f64)],
    ) -> (Vec<ForecastPoint>, FitKind) {
        if series.is_empty() {
            return (Vec::new(), FitKind::WideBand { reason: "empty series" });
        }

        // 時刻昇順で学習し、入力順へ戻す
        let mut order: Vec<usize> = (0..series.len()).collect();
        order.sort_by_key(|&i| series[i].0);
        let sorted: Vec<(NaiveDateTime, f64)> = order.iter().map(|&i| series[i]).collect();

        let (fitted, kind) = self.fit_sorted(&sorted);

        let mut indexed: Vec<(usize, ForecastPoint)> = order.into_iter().zip(fitted).collect();
        indexed.sort_by_key(|(i, _)| *i);
        (indexed.into_iter().map(|(_, p)| p).collect(), kind)
    }

    fn active_components(&self, span_days: f64) -> Vec<SeasonalComponent> {
        let seasonality = &self.config.seasonality;
        let mut components = Vec::new();
        if seasonality.daily {
            components.push(SeasonalComponent::daily(seasonality.daily_fourier_order));
        }
        if seasonality.weekly {
            components.push(SeasonalComponent::weekly(seasonality.weekly_fourier_order));
        }

        components.retain(|c| {
            let enough = span_days >= 2.0 * c.period_days;
            if !enough {
                debug!(
                    "Skipping {} seasonality: span {:.2} days < two periods",
                    c.name, span_days
                );
            }
            enough
        });
        components
    }

    fn fit_sorted(&self, sorted: &[(NaiveDateTime, f64)]) -> (Vec<ForecastPoint>, FitKind) {
        let n = sorted.len();
        let values: Vec<f64> = sorted.iter().map(|(_, v)| *v).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let magnitude = min.abs().max(max.abs());

        if n < 2 {
            return wide_band(sorted, "fewer than two observations");
        }
        if max - min <= 1e-12 * magnitude.max(1.0) {
            return wide_band(sorted, "constant series");
        }

        let t0 = sorted[0].0;
        let span_days = (sorted[n - 1].0 - t0).num_milliseconds() as f64 / MILLIS_PER_DAY;
        if span_days <= 0.0 {
            return wide_band(sorted, "zero time span");
        }

        let seasonality = &self.config.seasonality;
        let components = self.active_components(span_days);
        if (seasonality.daily || seasonality.weekly) && components.is_empty() {
            return wide_band(sorted, "less than two full seasonal periods");
        }

        let n_changepoints = self.config.n_changepoints.min((n - 1) / 4);
        let seasonal_columns: usize = components.iter().map(|c| 2 * c.fourier_order).sum();
        let p = 2 + n_changepoints + seasonal_columns;
        if n <= p {
            return wide_band(sorted, "too few observations for the model");
        }

        // 単位スケール化
        let y_scale = magnitude;
        let y = Array1::from_iter(values.iter().map(|v| v / y_scale));

        let changepoints: Vec<f64> = (1..=n_changepoints)
            .map(|j| self.config.changepoint_range * j as f64 / n_changepoints as f64)
            .collect();

        let mut x = Array2::<f64>::zeros((n, p));
        for (row, (timestamp, _)) in sorted.iter().enumerate() {
            let t = (*timestamp - t0).num_milliseconds() as f64 / MILLIS_PER_DAY / span_days;
            let days = timestamp.and_utc().timestamp_millis() as f64 / MILLIS_PER_DAY;

            x[[row, 0]] = 1.0;
            x[[row, 1]] = t;
            let mut col = 2;
            for s in &changepoints {
                x[[row, col]] = (t - s).max(0.0);
                col += 1;
            }
            for component in &components {
                for k in 1..=component.fourier_order {
                    let angle = 2.0 * PI * k as f64 * days / component.period_days;
                    x[[row, col]] = angle.sin();
                    x[[row, col + 1]] = angle.cos();
                    col += 2;
                }
            }
        }

        let changepoint_penalty =
            REFERENCE_NOISE_VARIANCE / self.config.changepoint_prior_scale.powi(2);
        let seasonal_penalty =
            REFERENCE_NOISE_VARIANCE / self.config.seasonality_prior_scale.powi(2);
        let mut penalties = vec![TREND_JITTER, TREND_JITTER];
        penalties.extend(std::iter::repeat(changepoint_penalty).take(n_changepoints));
        penalties.extend(std::iter::repeat(seasonal_penalty).take(seasonal_columns));

        let Some(beta) = solve_ridge(&x, &y, &penalties) else {
            warn!("Seasonal model could not be solved; falling back to wide band");
            return wide_band(sorted, "singular design matrix");
        };

        let fitted = x.dot(&beta);
        let rss: f64 = y
            .iter()
            .zip(fitted.iter())
            .map(|(actual, estimate)| (actual - estimate).powi(2))
            .sum();
        let sigma = (rss / (n - p) as f64).sqrt();
        let half_width = (self.z * sigma).max(MIN_HALF_WIDTH);

        let points = sorted
            .iter()
            .zip(fitted.iter())
            .map(|((timestamp, _), estimate)| {
                ForecastPoint::new(
                    *timestamp,
                    estimate * y_scale,
                    (estimate - half_width) * y_scale,
                    (estimate + half_width) * y_scale,
                )
            })
            .collect();

        let names: Vec<&'static str> = components.iter().map(|c| c.name).collect();
        info!(
            "Seasonal model fitted: rows={}, params={}, seasonality={:?}, sigma={:.4}",
            n,
            p,
            names,
            sigma * y_scale
        );

        (
            points,
            FitKind::Model {
                components: names,
                changepoints: n_changepoints,
                sigma: sigma * y_scale,
            },
        )
    }
}

/// 観測範囲を包含する広い区間（誤検知を抑制）
fn wide_band(sorted: &[(NaiveDateTime, f64)], reason: &'static str) -> (Vec<ForecastPoint>, FitKind) {
    let values = sorted.iter().map(|(_, v)| *v);
    let min = values.clone().fold(f64::INFINITY, f64::min);
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.sum::<f64>() / sorted.len() as f64;
    let pad = (max - min).max(1e-9 * min.abs().max(max.abs()).max(1.0));

    info!("Seasonal model degenerate ({}); using wide band", reason);

    let points = sorted
        .iter()
        .map(|(timestamp, _)| ForecastPoint::new(*timestamp, mean, min - pad, max + pad))
        .collect();
    (points, FitKind::WideBand { reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// 日次パターン＋小さな決定的ノイズ
    fn daily_series(days: i64) -> Vec<(NaiveDateTime, f64)> {
        (0..days * 24)
            .map(|h| {
                let hour = (h % 24) as f64;
                let pattern = 50.0 + 20.0 * (2.0 * PI * hour / 24.0).sin();
                let noise = 0.3 * ((h * 7919) % 13) as f64 / 13.0;
                (start() + Duration::hours(h), pattern + noise)
            })
            .collect()
    }

    fn forecaster() -> SeasonalForecaster {
        SeasonalForecaster::new(ForecastConfig::default()).unwrap()
    }

    #[test]
    fn test_fits_daily_pattern() {
        // 15 days covers two weekly periods
        let series = daily_series(15);
        let (points, kind) = forecaster().fit_predict_with_kind(&series);

        assert_eq!(points.len(), series.len());
        assert!(matches!(kind, FitKind::Model { ref components, .. } if components.len() == 2));

        let max_error = series
            .iter()
            .zip(&points)
            .map(|((_, v), p)| (v - p.yhat).abs())
            .fold(0.0, f64::max);
        assert!(max_error < 1.0, "max error {}", max_error);

        for p in &points {
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
        }
    }

    #[test]
    fn test_flags_injected_spike() {
        let mut series = daily_series(14);
        series[100].1 += 60.0;

        let points = forecaster().fit_predict(&series);
        assert!(points[100].is_outside(series[100].1));

        let worst = series
            .iter()
            .zip(&points)
            .enumerate()
            .max_by(|a, b| {
                let ea = (a.1 .0 .1 - a.1 .1.yhat).abs();
                let eb = (b.1 .0 .1 - b.1 .1.yhat).abs();
                ea.total_cmp(&eb)
            })
            .map(|(i, _)| i);
        assert_eq!(worst, Some(100));
    }

    #[test]
    fn test_constant_series_has_no_violations() {
        let series: Vec<_> = (0..24 * 21)
            .map(|h| (start() + Duration::hours(h), 12.5))
            .collect();
        let (points, kind) = forecaster().fit_predict_with_kind(&series);
        assert_eq!(kind, FitKind::WideBand { reason: "constant series" });
        assert!(series.iter().zip(&points).all(|((_, v), p)| !p.is_outside(*v)));
    }

    #[test]
    fn test_short_series_uses_wide_band() {
        let mut series = daily_series(1);
        series[5].1 = 5000.0;
        let (points, kind) = forecaster().fit_predict_with_kind(&series);
        assert!(matches!(kind, FitKind::WideBand { .. }));
        assert!(series.iter().zip(&points).all(|((_, v), p)| !p.is_outside(*v)));
    }

    #[test]
    fn test_output_follows_input_order() {
        let series = daily_series(14);
        let mut reversed = series.clone();
        reversed.reverse();

        let forward = forecaster().fit_predict(&series);
        let backward = forecaster().fit_predict(&reversed);

        let n = series.len();
        for i in 0..n {
            assert_eq!(forward[i].timestamp, backward[n - 1 - i].timestamp);
            assert!((forward[i].yhat - backward[n - 1 - i].yhat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wider_interval_never_adds_violations() {
        let mut series = daily_series(14);
        for (i, bump) in [(30, 4.0), (90, -3.0), (200, 8.0)] {
            series[i].1 += bump;
        }

        let count = |width: f64| {
            let config = ForecastConfig {
                interval_width: width,
                ..ForecastConfig::default()
            };
            let points = SeasonalForecaster::new(config).unwrap().fit_predict(&series);
            series
                .iter()
                .zip(&points)
                .filter(|((_, v), p)| p.is_outside(*v))
                .count()
        };

        assert!(count(0.95) <= count(0.80));
        assert!(count(0.99) <= count(0.95));
    }

    #[test]
    fn test_per_station_scope() {
        let base = daily_series(14);
        let mut records = Vec::new();
        for (ts, v) in &base {
            records.push(NormalizedRecord::new(*ts, StationId::from(1), *v));
            records.push(NormalizedRecord::new(*ts, StationId::from(2), v * 10.0));
        }

        let config = ForecastConfig {
            scope: ForecastScope::PerStation,
            ..ForecastConfig::default()
        };
        let points = SeasonalForecaster::new(config)
            .unwrap()
            .forecast_records(&records)
            .unwrap();

        assert_eq!(points.len(), records.len());
        assert!((points[1].yhat / points[0].yhat - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_invalid_interval_width() {
        let config = ForecastConfig {
            interval_width: 0.0,
            ..ForecastConfig::default()
        };
        assert!(SeasonalForecaster::new(config).is_err());
    }
}
