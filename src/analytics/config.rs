//! Detection Configuration
//!
//! 検知パスの明示的な設定（季節性・区間幅・汚染率・乱数シードなど）

use super::anomaly::Severity;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 季節性設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    /// 日次季節性
    pub daily: bool,
    /// 週次季節性
    pub weekly: bool,
    /// 日次フーリエ次数
    pub daily_fourier_order: usize,
    /// 週次フーリエ次数
    pub weekly_fourier_order: usize,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            daily: true,
            weekly: true,
            daily_fourier_order: 4,
            weekly_fourier_order: 3,
        }
    }
}

/// 予測モデルの適用範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastScope {
    /// 全行を1系列として学習
    #[default]
    Global,
    /// 基地局ごとに学習
    PerStation,
}

/// 季節予測器の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub seasonality: SeasonalityConfig,
    /// 予測区間の幅（0-1）
    pub interval_width: f64,
    /// トレンド変化点の数
    pub n_changepoints: usize,
    /// 変化点を配置する履歴の割合
    pub changepoint_range: f64,
    /// 変化点係数の事前スケール
    pub changepoint_prior_scale: f64,
    /// 季節性係数の事前スケール
    pub seasonality_prior_scale: f64,
    pub scope: ForecastScope,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            seasonality: SeasonalityConfig::default(),
            interval_width: 0.80,
            n_changepoints: 10,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            scope: ForecastScope::Global,
        }
    }
}

/// 外れ値の想定割合
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Contamination {
    /// スコア 0.5 を閾値とする
    #[default]
    Auto,
    /// 上位の割合を外れ値とする（0 < p <= 0.5）
    Fraction(f64),
}

impl Serialize for Contamination {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Contamination::Auto => serializer.serialize_str("auto"),
            Contamination::Fraction(p) => serializer.serialize_f64(*p),
        }
    }
}

impl<'de> Deserialize<'de> for Contamination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(p) => Ok(Contamination::Fraction(p)),
            Repr::Text(text) if text.trim().eq_ignore_ascii_case("auto") => Ok(Contamination::Auto),
            Repr::Text(text) => text
                .trim()
                .parse::<f64>()
                .map(Contamination::Fraction)
                .map_err(|_| serde::de::Error::custom(format!("invalid contamination '{}'", text))),
        }
    }
}

/// 外れ値検知器の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub contamination: Contamination,
    /// 木の数
    pub n_estimators: usize,
    /// 木ごとのサンプル数上限
    pub max_samples: usize,
    /// 乱数シード
    pub random_seed: u64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            contamination: Contamination::Auto,
            n_estimators: 100,
            max_samples: 256,
            random_seed: 42,
        }
    }
}

/// 重大度の決定方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SeverityPolicy {
    /// 全異常に固定の重大度
    Fixed { level: Severity },
    /// 予測区間からの逸脱比率で段階付け
    DeviationRatio,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        SeverityPolicy::Fixed {
            level: Severity::High,
        }
    }
}

/// 検知パス全体の設定
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub forecast: ForecastConfig,
    pub outlier: OutlierConfig,
    pub severity: SeverityPolicy,
}

impl DetectionConfig {
    /// 設定値を検証
    pub fn validate(&self) -> Result<()> {
        let forecast = &self.forecast;
        if !(forecast.interval_width > 0.0 && forecast.interval_width < 1.0) {
            return Err(Error::Config(format!(
                "interval_width must be in (0, 1), got {}",
                forecast.interval_width
            )));
        }
        if !(forecast.changepoint_range > 0.0 && forecast.changepoint_range <= 1.0) {
            return Err(Error::Config(format!(
                "changepoint_range must be in (0, 1], got {}",
                forecast.changepoint_range
            )));
        }
        if forecast.changepoint_prior_scale <= 0.0 || forecast.seasonality_prior_scale <= 0.0 {
            return Err(Error::Config("prior scales must be positive".to_string()));
        }
        let seasonality = &forecast.seasonality;
        if (seasonality.daily && seasonality.daily_fourier_order == 0)
            || (seasonality.weekly && seasonality.weekly_fourier_order == 0)
        {
            return Err(Error::Config(
                "enabled seasonalities need a Fourier order of at least 1".to_string(),
            ));
        }

        let outlier = &self.outlier;
        if outlier.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be at least 1".to_string()));
        }
        if outlier.max_samples < 2 {
            return Err(Error::Config("max_samples must be at least 2".to_string()));
        }
        if let Contamination::Fraction(p) = outlier.contamination {
            if !(p > 0.0 && p <= 0.5) {
                return Err(Error::Config(format!(
                    "contamination must be 'auto' or in (0, 0.5], got {}",
                    p
                )));
            }
        }
        Ok(())
    }
}
