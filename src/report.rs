//! 診断レポートの端末表示

use pathfinder_common::presentation::{NO_RESULTS_HINT, NO_RESULTS_TITLE};
use pathfinder_common::{ResultReport, ResultView};
use std::fmt::Write;

/// ResultView を端末表示用テキストに変換
pub fn render(view: &ResultView) -> String {
    match view {
        ResultView::Report(report) => render_report(report),
        ResultView::NoResults => format!(
            "{}\n{}\n→ `pathfinder diagnose <IMAGE>` で新しい解析を開始してください\n",
            NO_RESULTS_TITLE, NO_RESULTS_HINT
        ),
    }
}

fn render_report(report: &ResultReport) -> String {
    let mut out = String::new();
    let mark = if report.requires_review { "⚠" } else { "✔" };

    let _ = writeln!(out, "AI-Powered Diagnostic Report");
    let _ = writeln!(out, "============================");
    if let Some(url) = &report.image_url {
        let _ = writeln!(out, "Analyzed Image: {}", url);
    }
    let _ = writeln!(out, "Diagnosis:      {}", report.diagnosis);
    let _ = writeln!(out, "Confidence:     {}%", report.confidence_percentage);
    let _ = writeln!(out, "Level:          {}", report.confidence_level);

    if !report.findings.is_empty() {
        let _ = writeln!(out, "\nDetailed Findings:");
        for finding in &report.findings {
            let _ = writeln!(out, "  - {}", finding);
        }
    }

    let _ = writeln!(out, "\n{} {}", mark, report.review_message);
    out
}
