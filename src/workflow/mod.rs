//! 診断ワークフロー
//!
//! - machine: 同期の状態機械（ファイル選択・検証・試行管理）
//! - driver: サービス呼び出しを tokio タスクで実行し、完了を状態機械に反映する

mod driver;
mod machine;

pub use driver::{Completion, WorkflowDriver};
pub use machine::{AttemptId, AttemptTicket, DiagnosisWorkflow, Phase, WorkflowState};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("画像ファイルではありません: {0}")]
    InvalidFile(String),

    #[error("Please select an image to diagnose.")]
    NoFileSelected,

    #[error("解析中のため新しい試行を開始できません")]
    AttemptInFlight,

    #[error("試行が終了していません（現在: {phase:?}）")]
    Unfinished { phase: Phase },

    #[error("古い試行の応答を破棄しました: {attempt} (現在: {current:?})")]
    StaleResponse {
        attempt: AttemptId,
        current: Option<AttemptId>,
    },
}
