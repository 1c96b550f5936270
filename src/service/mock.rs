//! モック診断サービス
//!
//! 固定の待ち時間の後、決まった結果を返す。デモとテスト用。

use super::{DiagnosisService, ServiceError};
use crate::asset::ImageAsset;
use async_trait::async_trait;
use pathfinder_common::{JobHandle, ResultPayload};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

pub const MOCK_DIAGNOSIS: &str = "Positive for Tuberculosis";
pub const MOCK_CONFIDENCE: f64 = 0.88;

const MOCK_FINDINGS: &[&str] = &[
    "Cell morphology indicates potential presence of mycobacterium tuberculosis.",
    "No signs of parasitic infection were detected.",
    "Overall cell count is within normal range.",
    "Confidence score suggests high probability, but manual verification is recommended for confirmation.",
];

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// アップロードの擬似遅延
    pub submit_delay: Duration,
    /// 解析の擬似遅延
    pub resolve_delay: Duration,
    pub payload: ResultPayload,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            submit_delay: Duration::from_millis(1500),
            resolve_delay: Duration::from_millis(5000),
            payload: default_payload(),
        }
    }
}

impl MockConfig {
    /// 遅延なし（テスト用）
    pub fn instant() -> Self {
        Self {
            submit_delay: Duration::ZERO,
            resolve_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_payload(mut self, payload: ResultPayload) -> Self {
        self.payload = payload;
        self
    }
}

pub fn default_payload() -> ResultPayload {
    ResultPayload::new(MOCK_DIAGNOSIS, MOCK_CONFIDENCE)
        .map(|p| p.with_findings(MOCK_FINDINGS.iter().map(|s| s.to_string()).collect()))
        .expect("mock confidence is within [0, 1]")
}

#[derive(Debug, Default)]
pub struct MockDiagnosisService {
    config: MockConfig,
    next_job: AtomicU64,
    outstanding: Mutex<HashSet<String>>,
    submit_failure: Mutex<Option<ServiceError>>,
    resolve_failure: Mutex<Option<ServiceError>>,
    submit_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockDiagnosisService {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// 次の submit を1回だけ失敗させる
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        *lock(&self.submit_failure) = Some(ServiceError::SubmissionFailed(message.into()));
    }

    /// 次の resolve を1回だけ失敗させる
    pub fn fail_next_resolve(&self, error: ServiceError) {
        *lock(&self.resolve_failure) = Some(error);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// 発行済みで未解決・未返却のハンドル数
    pub fn outstanding_jobs(&self) -> usize {
        lock(&self.outstanding).len()
    }
}

#[async_trait]
impl DiagnosisService for MockDiagnosisService {
    async fn submit(&self, image: ImageAsset) -> Result<JobHandle, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        info!(file = image.name(), size = image.size(), "MOCK: uploading image");

        tokio::time::sleep(self.config.submit_delay).await;

        if let Some(err) = lock(&self.submit_failure).take() {
            return Err(err);
        }
        if image.content().is_empty() {
            return Err(ServiceError::SubmissionFailed("画像データが空です".into()));
        }
        if !image.is_image() {
            return Err(ServiceError::SubmissionFailed(format!(
                "画像ではありません: {}",
                image.media_type()
            )));
        }

        let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("mock_job_{}", n);
        lock(&self.outstanding).insert(id.clone());
        Ok(JobHandle::new(id))
    }

    async fn resolve(&self, job: JobHandle) -> Result<ResultPayload, ServiceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        info!(job = %job, "MOCK: polling for results");

        if !lock(&self.outstanding).remove(job.as_str()) {
            return Err(ServiceError::AnalysisFailed(format!(
                "未知または解決済みのジョブ: {}",
                job
            )));
        }

        tokio::time::sleep(self.config.resolve_delay).await;

        if let Some(err) = lock(&self.resolve_failure).take() {
            return Err(err);
        }
        Ok(self.config.payload.clone())
    }

    async fn release(&self, job: JobHandle) {
        if lock(&self.outstanding).remove(job.as_str()) {
            info!(job = %job, "MOCK: released abandoned job");
        }
    }
}

// ロック保持中にパニックしないため poisoned でも中身を使う
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
