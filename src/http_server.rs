//! HTTP API server
//!
//! アップロードされたデータセットの解析、外部アラートの転送、ヘルスチェックを提供する。

use crate::{
    alerting::{notifier_from_config, AlertNotifier, DeliveryStatus},
    analytics::DetectionReport,
    client::AlertFeedClient,
    config::{AlertingConfig, NetGuardConfig},
    error::{Error, Result},
    ingest::DataFormat,
    retry::RetryStrategy,
    service::AnalysisService,
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use validator::ValidateEmail;

/// ハンドラ間で共有する状態（すべて読み取り専用）
struct AppState {
    service: AnalysisService,
    notifier: AlertNotifier,
    alerting: AlertingConfig,
    feed: Option<AlertFeedClient>,
    analysis_timeout: Duration,
}

/// HTTP API サーバー
#[derive(Clone)]
pub struct NetGuardServer {
    state: Arc<AppState>,
    max_upload_bytes: usize,
}

impl NetGuardServer {
    /// 設定からサーバーを構築
    pub fn from_config(config: &NetGuardConfig) -> Result<Self> {
        let service = AnalysisService::new(config.columns.clone(), config.detection.clone())?;
        let notifier = notifier_from_config(&config.alerting)?;
        Self::new(service, notifier, config)
    }

    /// 解析サービスと通知器を指定して構築
    pub fn new(
        service: AnalysisService,
        notifier: AlertNotifier,
        config: &NetGuardConfig,
    ) -> Result<Self> {
        let feed = match &config.alerting.upstream_url {
            Some(url) => Some(
                AlertFeedClient::new(url.clone())?
                    .with_retry(RetryStrategy::from(&config.alerting.retry)),
            ),
            None => None,
        };

        Ok(Self {
            state: Arc::new(AppState {
                service,
                notifier,
                alerting: config.alerting.clone(),
                feed,
                analysis_timeout: Duration::from_secs(config.server.analysis_timeout_secs),
            }),
            max_upload_bytes: config.server.max_upload_bytes,
        })
    }

    /// axum Router を作成
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/analyze", post(handle_analyze))
            .route("/api/report", post(handle_report))
            .route("/health", get(handle_health))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.max_upload_bytes))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// 指定アドレスで待ち受け
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Starting NetGuard API on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// エラーレスポンス `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", error);
        } else {
            warn!("Request rejected: {}", error);
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// multipart から `file` フィールドを取り出す
async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // ファイル名なしのフィールドはファイルとして扱わない
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(Upload { file_name, bytes });
    }
    Err(ApiError::bad_request("No file part"))
}

async fn handle_analyze(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<DetectionReport>> {
    let upload = read_upload(multipart).await?;
    info!(
        "Received {} ({} bytes) for analysis",
        upload.file_name,
        upload.bytes.len()
    );

    let hint = DataFormat::from_path(Path::new(&upload.file_name));
    let state_for_task = Arc::clone(&state);
    let task = tokio::task::spawn_blocking(move || {
        state_for_task.service.analyze_bytes(&upload.bytes, hint)
    });

    let report = match tokio::time::timeout(state.analysis_timeout, task).await {
        Err(_) => {
            return Err(Error::Timeout(format!(
                "analysis exceeded {:?}",
                state.analysis_timeout
            ))
            .into())
        }
        Ok(Err(join_error)) => return Err(Error::Internal(join_error.to_string()).into()),
        Ok(Ok(result)) => result?,
    };

    // 通知は応答を遅らせない
    if let Some(recipient) = state.alerting.recipient.clone() {
        if !report.anomalies.is_empty() {
            let notifier = state.notifier.clone();
            let anomalies = report.anomalies.clone();
            tokio::spawn(async move {
                notifier.send_alert(&recipient, &anomalies).await;
            });
        }
    }

    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
struct ReportRequest {
    recipient: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    alerts: usize,
    delivery: DeliveryStatus,
}

async fn handle_report(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ReportResponse>> {
    let request: ReportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReportRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))?
    };

    let recipient = request
        .recipient
        .or_else(|| state.alerting.recipient.clone())
        .ok_or_else(|| ApiError::bad_request("recipient is required"))?;
    if !recipient.validate_email() {
        return Err(ApiError::bad_request(format!(
            "invalid recipient address '{}'",
            recipient
        )));
    }

    let feed = state.feed.as_ref().ok_or_else(|| {
        Error::Config("alerting.upstream_url is not configured".to_string())
    })?;
    let alerts = feed.fetch_alerts().await?;
    info!("Fetched {} alerts from {}", alerts.len(), feed.url());

    let delivery = state.notifier.send_alert(&recipient, &alerts).await;
    Ok(Json(ReportResponse {
        alerts: alerts.len(),
        delivery,
    }))
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
