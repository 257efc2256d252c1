//! Alerting Module
//!
//! 異常通知（HTML メッセージ生成・配送手段・通知器）

mod message;
mod notifier;
mod transport;

pub use message::{subject_line, AlertMessage};
pub use notifier::{AlertNotifier, DeliveryStatus};
pub use transport::{AlertTransport, DeliveryReceipt, LogTransport, WebhookTransport};

use crate::config::{AlertingConfig, TransportKind};
use crate::error::{Error, Result};
use std::sync::Arc;

/// 設定から通知器を構築
pub fn notifier_from_config(config: &AlertingConfig) -> Result<AlertNotifier> {
    let transport: Arc<dyn AlertTransport> = match config.transport {
        TransportKind::Log => Arc::new(LogTransport),
        TransportKind::Webhook => {
            let url = config.webhook_url.as_deref().ok_or_else(|| {
                Error::Config("alerting.webhook_url is required for the webhook transport".to_string())
            })?;
            Arc::new(WebhookTransport::new(url)?)
        }
    };
    Ok(AlertNotifier::new(transport))
}
