//! Alert Transports
//!
//! 配送手段の抽象化。ログ出力と Webhook (HTTP POST) を提供する。

use super::message::AlertMessage;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// 配送結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

impl DeliveryReceipt {
    fn generated() -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 配送手段トレイト
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// メッセージを配送
    async fn deliver(&self, message: &AlertMessage) -> Result<DeliveryReceipt>;

    /// 配送手段の名前
    fn name(&self) -> &'static str;
}

/// ログに記録するだけの配送手段
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl AlertTransport for LogTransport {
    async fn deliver(&self, message: &AlertMessage) -> Result<DeliveryReceipt> {
        let receipt = DeliveryReceipt::generated();
        info!(
            message_id = %receipt.message_id,
            recipient = %message.recipient,
            "{}",
            message.subject
        );
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default, alias = "id")]
    message_id: Option<String>,
}

/// メッセージを JSON で POST する配送手段
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    url: String,
    client: Client,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlertTransport for WebhookTransport {
    async fn deliver(&self, message: &AlertMessage) -> Result<DeliveryReceipt> {
        let response = self.client.post(&self.url).json(message).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        // 応答本文に ID があればそれを使う
        let body = response.text().await.unwrap_or_default();
        let message_id = serde_json::from_str::<WebhookResponse>(&body)
            .ok()
            .and_then(|r| r.message_id);

        Ok(match message_id {
            Some(message_id) => DeliveryReceipt { message_id },
            None => DeliveryReceipt::generated(),
        })
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
