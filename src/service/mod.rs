//! 診断サービス
//!
//! 画像を送信してジョブハンドルを得る `submit` と、
//! ハンドルを結果に解決する `resolve` の2操作だけを持つ。
//! ワークフローはこのトレイトにのみ依存し、モックとHTTP実装は差し替え可能。

mod http;
mod mock;
mod retry;

pub use http::{HttpDiagnosisService, HttpServiceOptions, SessionRequest};
pub use mock::{MockConfig, MockDiagnosisService};
pub use retry::RetryConfig;

use crate::asset::ImageAsset;
use crate::error::ErrorKind;
use async_trait::async_trait;
use pathfinder_common::{JobHandle, ResultPayload};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("画像の送信に失敗: {0}")]
    SubmissionFailed(String),

    #[error("解析に失敗: {0}")]
    AnalysisFailed(String),

    #[error("解析がタイムアウトしました（{}秒経過）", .waited.as_secs())]
    Timeout { waited: Duration },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::SubmissionFailed(_) => ErrorKind::SubmissionFailed,
            ServiceError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
            ServiceError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

#[async_trait]
pub trait DiagnosisService: Send + Sync {
    /// 画像を送信する
    ///
    /// 失敗時（種別不正・サイズ超過・通信エラー）は `SubmissionFailed` を返し、
    /// ハンドルは発行しない。
    async fn submit(&self, image: ImageAsset) -> Result<JobHandle, ServiceError>;

    /// ハンドルを結果に解決する
    ///
    /// ハンドルは消費され、再利用できない。
    /// 失敗は `AnalysisFailed` または `Timeout`。
    async fn resolve(&self, job: JobHandle) -> Result<ResultPayload, ServiceError>;

    /// 解決しないまま破棄するハンドルを返却する
    ///
    /// 放棄された試行の送信が後から完了した場合に呼ばれる。
    async fn release(&self, job: JobHandle) {
        tracing::debug!(job = %job, "job handle released");
    }
}
