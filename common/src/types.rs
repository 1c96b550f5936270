//! 診断結果の型定義
//!
//! CLIと将来のWeb UIで共有される型:
//! - ResultPayload: 診断ラベル + 信頼度（[0, 1]）
//! - JobHandle: 送信と結果取得を対応付ける不透明トークン
//! - ResultHandoff: 結果画面へ渡す {result, imageUrl}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 診断結果
///
/// `confidence` は常に閉区間 [0, 1] に収まる。範囲外の値は
/// コンストラクタでもデシリアライズでも拒否する（クランプはしない）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawResultPayload")]
pub struct ResultPayload {
    diagnosis_label: String,
    confidence: f64,
    findings: Vec<String>,
    /// バックエンドが返した信頼度区分（あればこちらを優先）
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence_level: Option<ConfidenceLevel>,
}

/// デシリアライズ用の未検証ペイロード
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResultPayload {
    #[serde(alias = "diagnosis", alias = "prediction")]
    diagnosis_label: String,
    confidence: f64,
    #[serde(default)]
    findings: Vec<String>,
    #[serde(default, alias = "confidence_level")]
    confidence_level: Option<String>,
}

impl TryFrom<RawResultPayload> for ResultPayload {
    type Error = Error;

    fn try_from(raw: RawResultPayload) -> Result<Self> {
        let mut payload =
            ResultPayload::new(raw.diagnosis_label, raw.confidence)?.with_findings(raw.findings);
        // 未知の区分名は無視して信頼度から計算する
        payload.confidence_level = raw.confidence_level.as_deref().and_then(ConfidenceLevel::parse);
        Ok(payload)
    }
}

impl ResultPayload {
    pub fn new(diagnosis_label: impl Into<String>, confidence: f64) -> Result<Self> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidConfidence(confidence));
        }
        Ok(Self {
            diagnosis_label: diagnosis_label.into(),
            // -0.0 を 0.0 に揃える
            confidence: confidence + 0.0,
            findings: Vec::new(),
            confidence_level: None,
        })
    }

    pub fn with_findings(mut self, findings: Vec<String>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_confidence_level(mut self, level: ConfidenceLevel) -> Self {
        self.confidence_level = Some(level);
        self
    }

    pub fn diagnosis_label(&self) -> &str {
        &self.diagnosis_label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    /// 表示する信頼度区分
    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
            .unwrap_or_else(|| ConfidenceLevel::from_confidence(self.confidence))
    }
}

/// 信頼度区分
///
/// バックエンドが保存時に付ける区分と同じ境界（0.9 / 0.7、いずれも以上）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// 0.9以上
    High,
    /// 0.7以上 0.9未満
    Medium,
    /// 0.7未満
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceLevel::High
        } else if confidence >= 0.7 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(ConfidenceLevel::High),
            "medium" => Some(ConfidenceLevel::Medium),
            "low" => Some(ConfidenceLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "High (≥90%)"),
            ConfidenceLevel::Medium => write!(f, "Medium (70-90%)"),
            ConfidenceLevel::Low => write!(f, "Low (<70%)"),
        }
    }
}

/// ジョブハンドル
///
/// 送信時に発行され、対応する結果取得で一度だけ消費される。
/// ワークフロー側では中身を解釈しない。
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    /// サービス実装がバックエンドの識別子から生成する
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// サービス実装専用: バックエンドへ返す識別子
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 結果画面への受け渡しデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHandoff {
    pub result: ResultPayload,
    /// 解析した画像の表示用参照（file:// URL）
    pub image_url: String,
}
