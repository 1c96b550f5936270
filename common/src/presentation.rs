//! 結果表示の導出
//!
//! ResultPayload とレビュー閾値から表示用の値を計算する純粋関数群。
//! 受け渡しデータがない場合は NoResults を返し、前回の結果は表示しない。

use crate::types::{ConfidenceLevel, ResultHandoff, ResultPayload};
use serde::Serialize;

/// レビュー閾値のデフォルト（これ未満は専門家レビュー要）
pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.75;

pub const REVIEW_REQUIRED_MESSAGE: &str =
    "This diagnosis requires immediate review by a qualified medical expert.";
pub const HIGH_CONFIDENCE_MESSAGE: &str = "This is a high-confidence diagnosis.";

pub const NO_RESULTS_TITLE: &str = "No results found.";
pub const NO_RESULTS_HINT: &str =
    "Please go back to the diagnosis page to start a new analysis.";

/// 結果画面の状態
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ResultView {
    Report(ResultReport),
    NoResults,
}

/// 診断レポート（表示用）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub diagnosis: String,
    /// 小数点以下2桁のパーセント表記（"88.00"）
    pub confidence_percentage: String,
    pub requires_review: bool,
    pub review_message: &'static str,
    pub confidence_level: ConfidenceLevel,
    pub findings: Vec<String>,
    pub image_url: Option<String>,
}

impl ResultView {
    /// 受け渡しデータから表示状態を導出
    ///
    /// 結果または画像参照が欠けていれば NoResults。
    pub fn derive(handoff: Option<&ResultHandoff>, threshold: f64) -> Self {
        match handoff {
            Some(h) if !h.image_url.is_empty() => {
                let mut report = ResultReport::from_payload(&h.result, threshold);
                report.image_url = Some(h.image_url.clone());
                ResultView::Report(report)
            }
            _ => ResultView::NoResults,
        }
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, ResultView::NoResults)
    }
}

impl ResultReport {
    pub fn from_payload(payload: &ResultPayload, threshold: f64) -> Self {
        let requires_review = requires_review(payload.confidence(), threshold);
        Self {
            diagnosis: payload.diagnosis_label().to_string(),
            confidence_percentage: confidence_percentage(payload.confidence()),
            requires_review,
            review_message: if requires_review {
                REVIEW_REQUIRED_MESSAGE
            } else {
                HIGH_CONFIDENCE_MESSAGE
            },
            confidence_level: payload.confidence_level(),
            findings: payload.findings().to_vec(),
            image_url: None,
        }
    }
}

/// 信頼度をパーセント文字列に変換（小数点以下2桁）
///
/// # Examples
/// ```
/// use pathfinder_common::presentation::confidence_percentage;
///
/// assert_eq!(confidence_percentage(0.88), "88.00");
/// assert_eq!(confidence_percentage(1.0), "100.00");
/// ```
pub fn confidence_percentage(confidence: f64) -> String {
    // "-0.00" を出さない
    format!("{:.2}", confidence * 100.0 + 0.0)
}

pub fn requires_review(confidence: f64, threshold: f64) -> bool {
    confidence < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff(confidence: f64) -> ResultHandoff {
        ResultHandoff {
            result: ResultPayload::new("Positive for Tuberculosis", confidence).unwrap(),
            image_url: "file:///tmp/slide.png".to_string(),
        }
    }

    #[test]
    fn test_negative_zero_renders_as_zero() {
        assert_eq!(confidence_percentage(-0.0), "0.00");
        let payload = ResultPayload::new("Normal", -0.0).unwrap();
        let report = ResultReport::from_payload(&payload, DEFAULT_REVIEW_THRESHOLD);
        assert_eq!(report.confidence_percentage, "0.00");
        assert!(report.requires_review);
    }

    #[test]
    fn test_high_confidence_report() {
        let view = ResultView::derive(Some(&handoff(0.88)), DEFAULT_REVIEW_THRESHOLD);
        let ResultView::Report(report) = view else {
            panic!("expected report");
        };
        assert_eq!(report.diagnosis, "Positive for Tuberculosis");
        assert_eq!(report.confidence_percentage, "88.00");
        assert!(!report.requires_review);
        assert_eq!(report.review_message, HIGH_CONFIDENCE_MESSAGE);
        assert_eq!(report.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(report.image_url.as_deref(), Some("file:///tmp/slide.png"));
    }

    #[test]
    fn test_low_confidence_requires_review() {
        let view = ResultView::derive(Some(&handoff(0.60)), DEFAULT_REVIEW_THRESHOLD);
        let ResultView::Report(report) = view else {
            panic!("expected report");
        };
        assert!(report.requires_review);
        assert_eq!(report.review_message, REVIEW_REQUIRED_MESSAGE);
        assert_eq!(report.confidence_percentage, "60.00");
    }

    #[test]
    fn test_threshold_boundary() {
        // 閾値ちょうどはレビュー不要
        assert!(!requires_review(0.75, DEFAULT_REVIEW_THRESHOLD));
        assert!(requires_review(0.7499, DEFAULT_REVIEW_THRESHOLD));
        assert!(requires_review(0.8, 0.9));
    }

    #[test]
    fn test_percentage_stays_in_range() {
        for i in 0..=100 {
            let confidence = i as f64 / 100.0;
            let pct: f64 = confidence_percentage(confidence).parse().unwrap();
            assert!((0.0..=100.0).contains(&pct), "{} -> {}", confidence, pct);
        }
        assert_eq!(confidence_percentage(0.0), "0.00");
        assert_eq!(confidence_percentage(0.12345), "12.35");
    }

    #[test]
    fn test_no_handoff_is_no_results() {
        assert!(ResultView::derive(None, DEFAULT_REVIEW_THRESHOLD).is_no_results());
    }

    #[test]
    fn test_missing_image_url_is_no_results() {
        let mut h = handoff(0.9);
        h.image_url.clear();
        assert!(ResultView::derive(Some(&h), DEFAULT_REVIEW_THRESHOLD).is_no_results());
    }
}
