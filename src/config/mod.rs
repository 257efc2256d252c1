//! Configuration
//!
//! 設定ファイル（TOML）と環境変数による設定管理

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AlertingConfig, LoggingSettings, NetGuardConfig, RotationStrategy, ServerConfig,
    TransportKind,
};

use crate::error::Result;
use std::path::Path;

impl NetGuardConfig {
    /// サンプル設定（コメント付き TOML）を生成
    pub fn sample_toml() -> Result<String> {
        let mut sample_config = NetGuardConfig::default();
        sample_config.alerting.recipient = Some("noc-team@example.com".to_string());
        sample_config.alerting.upstream_url = Some("http://127.0.0.1:5001/api/alerts".to_string());

        let toml_content = toml::to_string_pretty(&sample_config)?;

        Ok(format!(
            r#"# NetGuard Configuration File
#
# このファイルは netguard.toml として保存してください
# 環境変数での上書きも可能です (例: NETGUARD__SERVER__BIND_ADDR=0.0.0.0:5000)

{}
# 設定説明:
#
# [server]
# bind_addr = HTTP サーバーのバインドアドレス
# analysis_timeout_secs = 1回の解析の制限時間（秒）
# max_upload_bytes = アップロードサイズ上限
#
# [detection.forecast]
# interval_width = 予測区間の幅 (0-1)
# scope = "global"（全行で1モデル）または "per_station"（基地局ごと）
#
# [detection.outlier]
# contamination = "auto" または 外れ値の割合 (0 < p <= 0.5)
# random_seed = 乱数シード（同じデータ・同じシードなら結果は同一）
#
# [detection.severity]
# mode = "fixed"（level を全異常に付与）または "deviation_ratio"
#
# [columns]
# timestamp / cell_id / traffic_volume = 受け付ける列名（大文字小文字・空白は無視）
#
# [alerting]
# transport = "log" または "webhook"（webhook_url が必要）
# upstream_url = /api/report が参照する外部アラートサービス
"#,
            toml_content
        ))
    }

    /// サンプル設定ファイルを書き出す
    pub fn write_sample_config(path: &Path) -> Result<()> {
        std::fs::write(path, Self::sample_toml()?)?;
        Ok(())
    }
}
