use crate::config::{LoggingSettings, RotationStrategy};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "netguard.log";

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル (trace, debug, info, warn, error) または EnvFilter 指定
    pub level: String,
    /// ログディレクトリ
    pub log_dir: PathBuf,
    /// ファイルローテーション設定
    pub rotation: RotationStrategy,
    /// コンソール出力有効
    pub console_enabled: bool,
    /// ファイル出力有効
    pub file_enabled: bool,
    /// JSON 形式で出力
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: get_default_log_dir(),
            rotation: RotationStrategy::Daily,
            console_enabled: true,
            file_enabled: false,
            json: false,
        }
    }
}

impl LogConfig {
    /// 設定からログ設定を作成
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            log_dir: settings.log_dir.clone().unwrap_or_else(get_default_log_dir),
            rotation: settings.rotation,
            console_enabled: settings.console,
            file_enabled: settings.file,
            json: settings.json,
        }
    }

    /// ログレベルを上書き
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// EnvFilter を作成（不正な指定は info にフォールバック）
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// デフォルトログディレクトリを取得
/// 優先順位：
/// 1. カレントディレクトリの logs フォルダ
/// 2. システムテンプディレクトリの netguard フォルダ
fn get_default_log_dir() -> PathBuf {
    let current_log_dir = PathBuf::from("logs");
    if current_log_dir.is_dir() {
        return current_log_dir;
    }
    std::env::temp_dir().join("netguard").join("logs")
}

/// ログディレクトリを確保
fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// ログシステムを初期化
///
/// ファイル出力が有効な場合は返されたガードを保持している間だけ書き込まれる。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut guard = None;

    let file_layer = if config.file_enabled {
        ensure_log_dir(&config.log_dir)?;
        let file_appender = match config.rotation {
            RotationStrategy::Daily => rolling::daily(&config.log_dir, LOG_FILE_NAME),
            RotationStrategy::Hourly => rolling::hourly(&config.log_dir, LOG_FILE_NAME),
            RotationStrategy::Never => rolling::never(&config.log_dir, LOG_FILE_NAME),
        };
        let (writer, worker_guard) = non_blocking(file_appender);
        guard = Some(worker_guard);

        let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
        Some(if config.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        })
    } else {
        None
    };

    let console_layer = if config.console_enabled || !config.file_enabled {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true);
        Some(if config.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        "Logging initialized: level={}, console={}, file={} ({})",
        config.level,
        config.console_enabled,
        config.file_enabled,
        config.log_dir.display()
    );

    Ok(guard)
}
