//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// 信頼度が [0, 1] の範囲外（サービス側の契約違反）
    #[error("Confidence out of range: {0}")]
    InvalidConfidence(f64),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
