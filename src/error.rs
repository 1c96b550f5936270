use crate::service::ServiceError;
use crate::workflow::WorkflowError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagnoseError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("診断セッションの作成に失敗: {0}")]
    Session(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] pathfinder_common::Error),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type Result<T> = std::result::Result<T, DiagnoseError>;

/// ユーザーに見せるエラー分類
///
/// `StaleResponse` は破棄されるだけで表示されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFile,
    SubmissionFailed,
    AnalysisFailed,
    Timeout,
    StaleResponse,
}

impl ErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFile => "Please upload a valid image file",
            ErrorKind::SubmissionFailed => {
                "The image could not be submitted. Please try again or choose another image."
            }
            ErrorKind::AnalysisFailed => "An error occurred during diagnosis. Please try again.",
            ErrorKind::Timeout => "The analysis took too long to complete. Please try again.",
            ErrorKind::StaleResponse => "",
        }
    }

    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ErrorKind::StaleResponse)
    }
}
