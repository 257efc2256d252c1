//! Alert Notifier
//!
//! 異常リストを受け取りメッセージ生成と配送を行う。
//! 配送失敗はエラーではなく `DeliveryStatus::Failed` として返す。

use super::message::AlertMessage;
use super::transport::AlertTransport;
use crate::analytics::AnomalyRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use validator::ValidateEmail;

/// 配送状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// 異常なしのため送信せず
    Skipped,
    /// 送信済み
    Sent { message_id: String },
    /// 送信失敗
    Failed { reason: String },
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent { .. })
    }
}

/// アラート通知器
#[derive(Clone)]
pub struct AlertNotifier {
    transport: Arc<dyn AlertTransport>,
}

impl std::fmt::Debug for AlertNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertNotifier")
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl AlertNotifier {
    pub fn new(transport: Arc<dyn AlertTransport>) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// 異常リストを送信
    pub async fn send_alert(&self, recipient: &str, anomalies: &[AnomalyRecord]) -> DeliveryStatus {
        if anomalies.is_empty() {
            return DeliveryStatus::Skipped;
        }

        if !recipient.validate_email() {
            let reason = format!("invalid recipient address '{}'", recipient);
            error!("Alert not sent: {}", reason);
            return DeliveryStatus::Failed { reason };
        }

        let message = AlertMessage::render(recipient, anomalies);
        match self.transport.deliver(&message).await {
            Ok(receipt) => {
                info!(
                    "Sent alert for {} anomalies to {} via {}. Message Id: {}",
                    anomalies.len(),
                    recipient,
                    self.transport.name(),
                    receipt.message_id
                );
                DeliveryStatus::Sent {
                    message_id: receipt.message_id,
                }
            }
            Err(e) => {
                error!(
                    "Failed to send alert to {} via {}: {}",
                    recipient,
                    self.transport.name(),
                    e
                );
                DeliveryStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
