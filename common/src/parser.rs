//! 診断バックエンドのレスポンスパーサー
//!
//! アップロード応答から画像IDを取り出し、
//! ステータス確認応答を JobStatus に変換する

use crate::error::{Error, Result};
use crate::types::ResultPayload;
use serde::Deserialize;

/// ステータス確認の結果
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// 解析中（再ポーリングが必要）
    Pending { message: Option<String> },
    /// 解析完了
    Completed(ResultPayload),
    /// バックエンド側で解析失敗
    Failed { message: Option<String> },
}

#[derive(Deserialize)]
struct StatusEnvelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct UploadEnvelope {
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
}

/// アップロード応答から画像ID（ジョブ識別子）を取り出す
///
/// `image_id` を優先し、なければ旧形式の `job_id` を使う。
///
/// # Examples
/// ```
/// use pathfinder_common::parse_upload_response;
///
/// let id = parse_upload_response(r#"{"success": true, "image_id": "abc"}"#).unwrap();
/// assert_eq!(id, "abc");
/// ```
pub fn parse_upload_response(body: &str) -> Result<String> {
    let envelope: UploadEnvelope = serde_json::from_str(body)?;
    envelope
        .image_id
        .or(envelope.job_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::Parse("image_idがありません".into()))
}

#[derive(Deserialize)]
struct SessionEnvelope {
    #[serde(default)]
    session_id: Option<serde_json::Value>,
}

/// 診断セッション作成の応答からセッションIDを取り出す
///
/// IDは文字列・数値のどちらでも受け付ける。
pub fn parse_session_response(body: &str) -> Result<String> {
    let envelope: SessionEnvelope = serde_json::from_str(body)?;
    let id = match envelope.session_id {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if id.trim().is_empty() {
        return Err(Error::Parse("session_idがありません".into()));
    }
    Ok(id)
}

/// ステータス確認応答をパース
///
/// * `"completed"` → `result` を ResultPayload として検証
/// * `"processing"` / `"pending"` → Pending
/// * `"failed"` → Failed
pub fn parse_status_response(body: &str) -> Result<JobStatus> {
    let envelope: StatusEnvelope = serde_json::from_str(body)?;

    match envelope.status.as_str() {
        "completed" => {
            let result = envelope
                .result
                .ok_or_else(|| Error::Parse("completedなのにresultがありません".into()))?;
            let payload: ResultPayload = serde_json::from_value(result)
                .map_err(|e| Error::Parse(format!("resultの形式が不正: {}", e)))?;
            Ok(JobStatus::Completed(payload))
        }
        "processing" | "pending" => Ok(JobStatus::Pending {
            message: envelope.message,
        }),
        "failed" => Ok(JobStatus::Failed {
            message: envelope.message,
        }),
        other => Err(Error::Parse(format!("未知のstatus: {}", other))),
    }
}
