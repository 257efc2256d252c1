//! Prediction Analytics Module
//!
//! 季節予測モデル

pub mod linalg;
mod seasonal;
mod types;

pub use seasonal::{FitKind, SeasonalForecaster};
pub use types::{ForecastPoint, SeasonalComponent};
