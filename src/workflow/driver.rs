//! ワークフロー駆動
//!
//! サービス呼び出しをバックグラウンドタスクで実行し、完了通知をチャネルで受け取る。
//! 呼び出し側（CLIやUIループ）は待機中も応答性を保てる。

use super::{AttemptId, DiagnosisWorkflow, Phase, WorkflowError};
use crate::asset::ImageAsset;
use crate::error::Result;
use crate::service::{DiagnosisService, ServiceError};
use pathfinder_common::{JobHandle, ResultHandoff, ResultPayload};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, warn};

/// バックグラウンドタスクからの完了通知
#[derive(Debug)]
pub enum Completion {
    Submitted {
        attempt: AttemptId,
        outcome: std::result::Result<JobHandle, ServiceError>,
    },
    Resolved {
        attempt: AttemptId,
        outcome: std::result::Result<ResultPayload, ServiceError>,
    },
}

pub struct WorkflowDriver {
    workflow: DiagnosisWorkflow,
    service: Arc<dyn DiagnosisService>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    // drop 時に未完了タスクは中断される
    tasks: JoinSet<()>,
}

impl WorkflowDriver {
    pub fn new(service: Arc<dyn DiagnosisService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            workflow: DiagnosisWorkflow::new(),
            service,
            tx,
            rx,
            tasks: JoinSet::new(),
        }
    }

    pub fn workflow(&self) -> &DiagnosisWorkflow {
        &self.workflow
    }

    pub fn phase(&self) -> Phase {
        self.workflow.phase()
    }

    /// 解析開始ボタンを有効にしてよいか
    pub fn can_start(&self) -> bool {
        !self.phase().is_in_flight() && self.workflow.state().selected_image.is_some()
    }

    pub fn select_file(&mut self, image: ImageAsset) -> std::result::Result<(), WorkflowError> {
        self.workflow.select_file(image)
    }

    pub fn clear(&mut self) -> std::result::Result<(), WorkflowError> {
        self.workflow.clear()
    }

    /// 試行を開始して submit をバックグラウンドで実行する
    pub fn start_analysis(&mut self) -> std::result::Result<AttemptId, WorkflowError> {
        let ticket = self.workflow.begin_analysis()?;
        let attempt = ticket.attempt;
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();

        self.tasks.spawn(async move {
            let outcome = guarded(
                async move { service.submit(ticket.image).await },
                ServiceError::SubmissionFailed,
            )
            .await;
            // 受信側が drop 済みなら結果は不要
            let _ = tx.send(Completion::Submitted { attempt, outcome });
        });
        Ok(attempt)
    }

    /// 完了通知を1件処理する
    ///
    /// 実行中のタスクも未処理の通知もなければ `None`。
    /// 破棄された古い応答は `Some(Err(StaleResponse))`。
    pub async fn next_event(&mut self) -> Option<std::result::Result<Phase, WorkflowError>> {
        loop {
            while self.tasks.try_join_next().is_some() {}

            if let Ok(completion) = self.rx.try_recv() {
                return Some(self.apply(completion));
            }
            if self.tasks.is_empty() {
                return None;
            }

            let received = tokio::select! {
                completion = self.rx.recv() => completion,
                _ = self.tasks.join_next() => None,
            };
            if let Some(completion) = received {
                return Some(self.apply(completion));
            }
        }
    }

    /// 1回の試行を終端状態まで実行し、結果の受け渡しデータを返す
    pub async fn run_attempt(&mut self) -> Result<ResultHandoff> {
        self.start_analysis()?;

        while let Some(event) = self.next_event().await {
            match event {
                Ok(Phase::Succeeded) => break,
                Ok(Phase::Failed) => break,
                Ok(_) | Err(WorkflowError::StaleResponse { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        let phase = self.workflow.phase();
        match phase {
            Phase::Succeeded => {
                if let Some(handoff) = self.workflow.handoff() {
                    return Ok(handoff.clone());
                }
            }
            Phase::Failed => {
                if let Some(err) = self.workflow.last_failure() {
                    return Err(err.clone().into());
                }
            }
            _ => {}
        }
        Err(WorkflowError::Unfinished { phase }.into())
    }

    fn apply(&mut self, completion: Completion) -> std::result::Result<Phase, WorkflowError> {
        match completion {
            Completion::Submitted { attempt, outcome } => {
                if let Err(stale) = self.workflow.check_submission(attempt) {
                    // 放棄された試行のハンドルは解決せずに返却する
                    if let Ok(job) = outcome {
                        self.spawn_release(job);
                    }
                    return Err(stale);
                }
                if let Some(job) = self.workflow.submission_completed(attempt, outcome)? {
                    self.spawn_resolve(attempt, job);
                }
            }
            Completion::Resolved { attempt, outcome } => {
                self.workflow.resolution_completed(attempt, outcome)?;
            }
        }
        debug!(phase = ?self.workflow.phase(), "workflow updated");
        Ok(self.workflow.phase())
    }

    fn spawn_resolve(&mut self, attempt: AttemptId, job: JobHandle) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        self.tasks.spawn(async move {
            let outcome = guarded(
                async move { service.resolve(job).await },
                ServiceError::AnalysisFailed,
            )
            .await;
            let _ = tx.send(Completion::Resolved { attempt, outcome });
        });
    }

    fn spawn_release(&mut self, job: JobHandle) {
        let service = Arc::clone(&self.service);
        self.tasks.spawn(async move { service.release(job).await });
    }
}

/// サービス呼び出しを別タスクで実行する
///
/// パニックしても完了通知が届くよう `on_panic` の失敗に変換する。
async fn guarded<T, F>(
    call: F,
    on_panic: fn(String) -> ServiceError,
) -> std::result::Result<T, ServiceError>
where
    T: Send + 'static,
    F: Future<Output = std::result::Result<T, ServiceError>> + Send + 'static,
{
    let handle = tokio::spawn(call);
    // 外側のタスクが中断されたら内側も止める
    let _abort = AbortOnDrop(handle.abort_handle());
    match handle.await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %err, "service call aborted");
            Err(on_panic(format!("サービス呼び出しが異常終了しました: {}", err)))
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
