//! Prediction Types
//!
//! 予測分析用の型定義

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 予測点（入力行と1対1）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// タイムスタンプ
    pub timestamp: NaiveDateTime,
    /// 予測値
    pub yhat: f64,
    /// 予測区間下限
    pub yhat_lower: f64,
    /// 予測区間上限
    pub yhat_upper: f64,
}

impl ForecastPoint {
    /// 新しい予測点を作成
    pub fn new(timestamp: NaiveDateTime, yhat: f64, yhat_lower: f64, yhat_upper: f64) -> Self {
        Self {
            timestamp,
            yhat,
            yhat_lower,
            yhat_upper,
        }
    }

    /// 観測値が予測区間の外側か
    pub fn is_outside(&self, value: f64) -> bool {
        value < self.yhat_lower || value > self.yhat_upper
    }

    /// 区間の半幅
    pub fn half_width(&self) -> f64 {
        (self.yhat_upper - self.yhat_lower) / 2.0
    }

    /// 区間外への逸脱量（区間内なら 0）
    pub fn excess(&self, value: f64) -> f64 {
        if value < self.yhat_lower {
            self.yhat_lower - value
        } else if value > self.yhat_upper {
            value - self.yhat_upper
        } else {
            0.0
        }
    }
}

/// 周期成分の定義
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalComponent {
    pub name: &'static str,
    /// 周期（日）
    pub period_days: f64,
    /// フーリエ次数
    pub fourier_order: usize,
}

impl SeasonalComponent {
    pub const fn daily(fourier_order: usize) -> Self {
        Self {
            name: "daily",
            period_days: 1.0,
            fourier_order,
        }
    }

    pub const fn weekly(fourier_order: usize) -> Self {
        Self {
            name: "weekly",
            period_days: 7.0,
            fourier_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point() -> ForecastPoint {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ForecastPoint::new(ts, 10.0, 8.0, 12.0)
    }

    #[test]
    fn test_interval_membership() {
        let p = point();
        assert!(!p.is_outside(8.0));
        assert!(!p.is_outside(12.0));
        assert!(p.is_outside(7.99));
        assert!(p.is_outside(12.5));
    }

    #[test]
    fn test_excess() {
        let p = point();
        assert_eq!(p.half_width(), 2.0);
        assert_eq!(p.excess(10.0), 0.0);
        assert_eq!(p.excess(15.0), 3.0);
        assert_eq!(p.excess(6.0), 2.0);
    }
}
