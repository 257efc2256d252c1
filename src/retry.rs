//! Retry Strategies
//!
//! 外部サービス呼び出しのリトライ戦略。
//! 一時的な障害のみ再試行し、試行回数を使い切ったら `Error::Upstream` を返す。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// リトライ戦略
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// 固定間隔でリトライ
    FixedInterval {
        interval: Duration,
        max_attempts: u32,
    },
    /// 指数バックオフ
    ExponentialBackoff {
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        max_attempts: u32,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::default_fixed()
    }
}

impl RetryStrategy {
    /// デフォルトの固定間隔戦略（3回・1秒間隔）
    pub fn default_fixed() -> Self {
        Self::FixedInterval {
            interval: Duration::from_secs(1),
            max_attempts: 3,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::FixedInterval { max_attempts, .. }
            | Self::ExponentialBackoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// `attempt` 回目の失敗後に待つ時間（1始まり）
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            Self::FixedInterval { interval, .. } => *interval,
            Self::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let millis = (initial_delay.as_millis() as f64 * factor).min(max_delay.as_millis() as f64);
                Duration::from_millis(millis as u64)
            }
        }
    }

    /// リトライ可能な操作を実行
    pub async fn execute<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let max_attempts = self.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !self.should_retry(&e) => return Err(e),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        let delay = self.delay_after(attempt);
                        info!(
                            "Retrying operation (attempt {}/{}), delay: {:?}: {}",
                            attempt, max_attempts, delay, last_error
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        warn!("All {} retry attempts failed: {}", max_attempts, last_error);
        Err(Error::Upstream {
            attempts: max_attempts,
            message: last_error,
        })
    }

    /// エラーがリトライ可能かどうかを判定
    fn should_retry(&self, error: &Error) -> bool {
        error.is_transient()
    }
}

/// 設定ファイル上のリトライ方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    #[default]
    Fixed,
    Exponential,
}

/// リトライ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub kind: RetryKind,
    /// 総試行回数
    pub max_attempts: u32,
    /// 固定間隔、または指数バックオフの初期遅延（ミリ秒）
    pub delay_ms: u64,
    /// 指数バックオフの上限（ミリ秒）
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            kind: RetryKind::Fixed,
            max_attempts: 3,
            delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryStrategy {
    fn from(config: &RetryConfig) -> Self {
        match config.kind {
            RetryKind::Fixed => RetryStrategy::FixedInterval {
                interval: Duration::from_millis(config.delay_ms),
                max_attempts: config.max_attempts,
            },
            RetryKind::Exponential => RetryStrategy::ExponentialBackoff {
                initial_delay: Duration::from_millis(config.delay_ms),
                max_delay: Duration::from_millis(config.max_delay_ms),
                multiplier: config.multiplier,
                max_attempts: config.max_attempts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn unavailable() -> Error {
        Error::UpstreamStatus {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fixed_interval_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let strategy = RetryStrategy::FixedInterval {
            interval: Duration::from_millis(10),
            max_attempts: 3,
        };

        let result = strategy
            .execute(|| {
                let counter = Arc::clone(&counter_clone);
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(unavailable())
                    } else {
                        Ok("Success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "Success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_surface_upstream() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_attempts: 4,
        };

        let start = std::time::Instant::now();
        let result: Result<()> = strategy
            .execute(|| {
                let counter = Arc::clone(&counter_clone);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Upstream { attempts: 4, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        // 1 + 2 + 4 = 7ms の遅延があるはず
        assert!(start.elapsed() >= Duration::from_millis(6));
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result: Result<()> = RetryStrategy::default_fixed()
            .execute(|| {
                let counter = Arc::clone(&counter_clone);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::UpstreamStatus {
                        status: 404,
                        message: "not found".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::UpstreamStatus { status: 404, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delays() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
            max_attempts: 5,
        };
        assert_eq!(strategy.delay_after(1), Duration::from_millis(100));
        assert_eq!(strategy.delay_after(2), Duration::from_millis(200));
        assert_eq!(strategy.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn test_strategy_from_config() {
        let strategy = RetryStrategy::from(&RetryConfig::default());
        assert_eq!(strategy, RetryStrategy::default_fixed());
    }
}
