//! HTTP診断サービス
//!
//! - submit: `POST {api_url}/mobile/upload-micronet/`（multipart）
//! - resolve: `GET {api_url}/mobile/result-micronet/{image_id}/` を完了までポーリング
//! - create_session: `POST {api_url}/mobile/create-session/`（送信に必要な session_id を取得）
//!
//! ステータス確認は通信エラー・5xx・408・429でバックオフ付きリトライし、
//! 全体の待ち時間が上限を超えたら Timeout とする。

use super::{DiagnosisService, RetryConfig, ServiceError};
use crate::asset::ImageAsset;
use crate::error::{DiagnoseError, Result};
use async_trait::async_trait;
use pathfinder_common::{
    parse_session_response, parse_status_response, parse_upload_response, JobHandle, JobStatus,
    ResultPayload,
};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpServiceOptions {
    pub api_url: String,
    pub session_id: String,
    pub task_type: String,
    pub max_upload_bytes: u64,
    pub poll_interval: Duration,
    /// resolve 全体の上限
    pub timeout: Duration,
    pub retry: RetryConfig,
}

/// 診断セッション作成リクエスト
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub patient_id: String,
    pub disease_type: String,
}

#[derive(Debug, Clone)]
pub struct HttpDiagnosisService {
    client: reqwest::Client,
    options: HttpServiceOptions,
}

impl HttpDiagnosisService {
    pub fn new(options: HttpServiceOptions) -> Result<Self> {
        if options.session_id.trim().is_empty() {
            return Err(DiagnoseError::Config(
                "session_idが未設定です。`pathfinder config --set-session ID` で設定してください".into(),
            ));
        }
        let client = build_client()?;
        Ok(Self { client, options })
    }

    /// 診断セッションを作成し、セッションIDを返す
    ///
    /// 作成は冪等でないためリトライしない。
    pub async fn create_session(api_url: &str, request: &SessionRequest) -> Result<String> {
        if request.patient_id.trim().is_empty() {
            return Err(DiagnoseError::Session("patient_idが空です".into()));
        }
        let client = build_client()?;
        let url = endpoint(api_url, "mobile/create-session/");
        info!(%url, patient = %request.patient_id, disease = %request.disease_type, "creating diagnostic session");

        let resp = client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DiagnoseError::Session(format!("通信エラー: {}", e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DiagnoseError::Session(format!("レスポンス読み込みエラー: {}", e)))?;
        if !status.is_success() {
            return Err(DiagnoseError::Session(format!("HTTP {}: {}", status, body)));
        }

        let session_id =
            parse_session_response(&body).map_err(|e| DiagnoseError::Session(e.to_string()))?;
        debug!(%session_id, "session created");
        Ok(session_id)
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint(&self.options.api_url, path)
    }

    fn check_upload(&self, image: &ImageAsset) -> std::result::Result<(), ServiceError> {
        if image.content().is_empty() {
            return Err(ServiceError::SubmissionFailed("画像データが空です".into()));
        }
        if !image.is_image() {
            return Err(ServiceError::SubmissionFailed(format!(
                "画像ではありません: {}",
                image.media_type()
            )));
        }
        if image.size() > self.options.max_upload_bytes {
            return Err(ServiceError::SubmissionFailed(format!(
                "ファイルサイズが上限を超えています: {} > {} bytes",
                image.size(),
                self.options.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn poll_until_done(&self, url: &str) -> std::result::Result<ResultPayload, ServiceError> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            match self.fetch_status(url).await? {
                JobStatus::Completed(payload) => {
                    info!(polls, diagnosis = payload.diagnosis_label(), "analysis completed");
                    return Ok(payload);
                }
                JobStatus::Failed { message } => {
                    return Err(ServiceError::AnalysisFailed(
                        message.unwrap_or_else(|| "バックエンドで解析に失敗しました".into()),
                    ));
                }
                JobStatus::Pending { message } => {
                    debug!(polls, message = message.as_deref().unwrap_or(""), "analysis pending");
                    tokio::time::sleep(self.options.poll_interval).await;
                }
            }
        }
    }

    /// ステータスを1回取得（一時的な失敗はリトライ）
    async fn fetch_status(&self, url: &str) -> std::result::Result<JobStatus, ServiceError> {
        let retry = &self.options.retry;
        let max_attempts = retry.effective_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| ServiceError::AnalysisFailed(format!("レスポンス読み込みエラー: {}", e)))?;
                    return parse_status_response(&body)
                        .map_err(|e| ServiceError::AnalysisFailed(e.to_string()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if retry.should_retry_status(status) && attempt < max_attempts {
                        let delay = retry.backoff_delay(attempt);
                        warn!(%status, attempt, ?delay, "status check failed, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ServiceError::AnalysisFailed(format!(
                        "ステータス確認に失敗 (HTTP {})",
                        status
                    )));
                }
                Err(err) => {
                    if retry.should_retry_error(&err) && attempt < max_attempts {
                        let delay = retry.backoff_delay(attempt);
                        warn!(error = %err, attempt, ?delay, "status check transport error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ServiceError::AnalysisFailed(format!("通信エラー: {}", err)));
                }
            }
        }
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DiagnoseError::Config(format!("HTTPクライアント初期化エラー: {}", e)))
}

fn endpoint(api_url: &str, path: &str) -> String {
    format!("{}/{}", api_url.trim_end_matches('/'), path)
}

#[async_trait]
impl DiagnosisService for HttpDiagnosisService {
    async fn submit(&self, image: ImageAsset) -> std::result::Result<JobHandle, ServiceError> {
        self.check_upload(&image)?;

        let part = Part::bytes(image.content().to_vec())
            .file_name(image.name().to_string())
            .mime_str(image.media_type())
            .map_err(|e| ServiceError::SubmissionFailed(format!("メディアタイプが不正: {}", e)))?;
        let form = Form::new()
            .text("session_id", self.options.session_id.clone())
            .text("task_type", self.options.task_type.clone())
            .part("image", part);

        let url = self.endpoint("mobile/upload-micronet/");
        info!(%url, file = image.name(), size = image.size(), "uploading image");

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::SubmissionFailed(format!("通信エラー: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::SubmissionFailed(format!("レスポンス読み込みエラー: {}", e)))?;
        if !status.is_success() {
            return Err(ServiceError::SubmissionFailed(format!("HTTP {}: {}", status, body)));
        }

        let image_id =
            parse_upload_response(&body).map_err(|e| ServiceError::SubmissionFailed(e.to_string()))?;
        Ok(JobHandle::new(image_id))
    }

    async fn resolve(&self, job: JobHandle) -> std::result::Result<ResultPayload, ServiceError> {
        let url = self.endpoint(&format!("mobile/result-micronet/{}/", job.as_str()));
        let started = Instant::now();
        let deadline = started + self.options.timeout;

        match tokio::time::timeout_at(deadline, self.poll_until_done(&url)).await {
            Ok(result) => result,
            Err(_) => {
                let waited = started.elapsed();
                warn!(job = %job, ?waited, "analysis timed out");
                Err(ServiceError::Timeout { waited })
            }
        }
    }
}
