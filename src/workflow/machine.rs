//! 診断ワークフローの状態機械
//!
//! Idle → Selected → Submitting → Analyzing → Succeeded | Failed
//!
//! サービス呼び出しは行わない。完了通知は試行ID付きで受け取り、
//! 現在の試行と一致しないものは StaleResponse として破棄する。

use super::WorkflowError;
use crate::asset::ImageAsset;
use crate::error::ErrorKind;
use crate::service::ServiceError;
use pathfinder_common::{JobHandle, ResultHandoff, ResultPayload};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selected,
    Submitting,
    Analyzing,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Submitting | Phase::Analyzing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

/// 試行ID（単調増加）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 送信開始時に渡されるチケット
#[derive(Debug, Clone)]
pub struct AttemptTicket {
    pub attempt: AttemptId,
    pub image: ImageAsset,
}

#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub selected_image: Option<ImageAsset>,
    pub phase: Phase,
    pub last_error: Option<ErrorKind>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            selected_image: None,
            phase: Phase::Idle,
            last_error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosisWorkflow {
    state: WorkflowState,
    next_attempt: u64,
    current: Option<AttemptId>,
    handoff: Option<ResultHandoff>,
    failure: Option<ServiceError>,
}

impl DiagnosisWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state.last_error
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.current
    }

    /// Succeeded のときだけ結果を返す
    pub fn handoff(&self) -> Option<&ResultHandoff> {
        self.handoff.as_ref()
    }

    pub fn last_failure(&self) -> Option<&ServiceError> {
        self.failure.as_ref()
    }

    /// ファイル選択（どの状態からでも可）
    ///
    /// 画像でなければ状態はそのままで InvalidFile。
    /// 画像なら前回の試行（ハンドル・結果・エラー）を破棄して Selected へ。
    pub fn select_file(&mut self, image: ImageAsset) -> Result<(), WorkflowError> {
        if !image.is_image() {
            warn!(file = image.name(), media_type = image.media_type(), "rejected non-image file");
            self.state.last_error = Some(ErrorKind::InvalidFile);
            return Err(WorkflowError::InvalidFile(image.media_type().to_string()));
        }

        if let Some(abandoned) = self.current.take() {
            if self.state.phase.is_in_flight() {
                info!(attempt = %abandoned, "abandoning in-flight attempt");
            }
        }

        debug!(file = image.name(), size = image.size(), "file selected");
        self.state = WorkflowState {
            selected_image: Some(image),
            phase: Phase::Selected,
            last_error: None,
        };
        self.handoff = None;
        self.failure = None;
        Ok(())
    }

    /// 解析開始
    ///
    /// ファイルが選択済みで、送信中・解析中でないことが条件。
    pub fn begin_analysis(&mut self) -> Result<AttemptTicket, WorkflowError> {
        if self.state.phase.is_in_flight() {
            return Err(WorkflowError::AttemptInFlight);
        }
        let Some(image) = self.state.selected_image.clone() else {
            self.state.last_error = Some(ErrorKind::InvalidFile);
            return Err(WorkflowError::NoFileSelected);
        };

        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        self.current = Some(attempt);
        self.state.phase = Phase::Submitting;
        self.state.last_error = None;
        self.handoff = None;
        self.failure = None;

        info!(%attempt, file = image.name(), "attempt started");
        Ok(AttemptTicket { attempt, image })
    }

    /// submit の完了通知を現在の試行として受け付けるか
    pub fn check_submission(&self, attempt: AttemptId) -> Result<(), WorkflowError> {
        self.ensure_current(attempt, Phase::Submitting)
    }

    /// submit の完了
    ///
    /// 成功なら Analyzing に進み、resolve に渡すハンドルを返す。
    /// 失敗なら Failed となり `Ok(None)`。
    pub fn submission_completed(
        &mut self,
        attempt: AttemptId,
        outcome: Result<JobHandle, ServiceError>,
    ) -> Result<Option<JobHandle>, WorkflowError> {
        self.ensure_current(attempt, Phase::Submitting)?;

        match outcome {
            Ok(job) => {
                debug!(%attempt, job = %job, "submission accepted");
                self.state.phase = Phase::Analyzing;
                Ok(Some(job))
            }
            Err(err) => {
                self.fail(attempt, err);
                Ok(None)
            }
        }
    }

    /// resolve の完了
    pub fn resolution_completed(
        &mut self,
        attempt: AttemptId,
        outcome: Result<ResultPayload, ServiceError>,
    ) -> Result<Phase, WorkflowError> {
        self.ensure_current(attempt, Phase::Analyzing)?;

        match outcome {
            Ok(result) => {
                let image_url = self
                    .state
                    .selected_image
                    .take()
                    .map(|img| img.display_url().to_string())
                    .unwrap_or_default();
                info!(%attempt, diagnosis = result.diagnosis_label(), confidence = result.confidence(), "attempt succeeded");
                self.handoff = Some(ResultHandoff { result, image_url });
                self.state.phase = Phase::Succeeded;
            }
            Err(err) => self.fail(attempt, err),
        }
        Ok(self.state.phase)
    }

    /// 選択解除（送信中・解析中は不可）
    pub fn clear(&mut self) -> Result<(), WorkflowError> {
        if self.state.phase.is_in_flight() {
            return Err(WorkflowError::AttemptInFlight);
        }
        self.state = WorkflowState::default();
        self.current = None;
        self.handoff = None;
        self.failure = None;
        Ok(())
    }

    fn ensure_current(&self, attempt: AttemptId, expected: Phase) -> Result<(), WorkflowError> {
        if self.current != Some(attempt) || self.state.phase != expected {
            debug!(%attempt, current = ?self.current, phase = ?self.state.phase, "discarding stale response");
            return Err(WorkflowError::StaleResponse {
                attempt,
                current: self.current,
            });
        }
        Ok(())
    }

    // 送信・解析の失敗は選択画像も破棄する（自動リトライしない）
    fn fail(&mut self, attempt: AttemptId, err: ServiceError) {
        warn!(%attempt, error = %err, "attempt failed");
        self.state.phase = Phase::Failed;
        self.state.last_error = Some(err.kind());
        self.state.selected_image = None;
        self.failure = Some(err);
    }
}
