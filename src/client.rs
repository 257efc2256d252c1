//! Alert feed client for the external alerting service.

use crate::{
    analytics::AnomalyRecord,
    error::{Error, Result},
    retry::RetryStrategy,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Accepted response shapes: a bare array or `{"alerts": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedPayload {
    List(Vec<AnomalyRecord>),
    Wrapped { alerts: Vec<AnomalyRecord> },
}

impl FeedPayload {
    fn into_alerts(self) -> Vec<AnomalyRecord> {
        match self {
            FeedPayload::List(alerts) | FeedPayload::Wrapped { alerts } => alerts,
        }
    }
}

/// Client that fetches the live alert list with bounded retry
#[derive(Debug, Clone)]
pub struct AlertFeedClient {
    client: Client,
    url: String,
    retry: RetryStrategy,
}

impl AlertFeedClient {
    /// Create a new client with the default retry strategy
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry: RetryStrategy::default(),
        })
    }

    /// Replace the retry strategy
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch alerts, retrying transient failures
    pub async fn fetch_alerts(&self) -> Result<Vec<AnomalyRecord>> {
        self.retry.execute(|| self.fetch_once()).await
    }

    async fn fetch_once(&self) -> Result<Vec<AnomalyRecord>> {
        debug!("Fetching alerts from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let payload: FeedPayload = response.json().await?;
        Ok(payload.into_alerts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        let record = r#"{"base_station_id": 5, "anomaly_type": "Temporal Shift",
            "timestamp": "2024-01-01T00:00:00", "severity": "high", "details": "x"}"#;

        let list: FeedPayload = serde_json::from_str(&format!("[{}]", record)).unwrap();
        assert_eq!(list.into_alerts().len(), 1);

        let wrapped: FeedPayload =
            serde_json::from_str(&format!(r#"{{"alerts": [{}, {}]}}"#, record, record)).unwrap();
        assert_eq!(wrapped.into_alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_exhausts_retries() {
        let client = AlertFeedClient::new("http://127.0.0.1:9/alerts")
            .unwrap()
            .with_retry(RetryStrategy::FixedInterval {
                interval: Duration::from_millis(5),
                max_attempts: 2,
            });
        let result = client.fetch_alerts().await;
        assert!(matches!(result, Err(Error::Upstream { attempts: 2, .. })));
    }
}
