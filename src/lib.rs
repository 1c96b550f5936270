//! Pathfinder 画像診断ワークフロー
//!
//! 画像選択 → 送信 → 結果取得 → 結果表示 の流れを、
//! 差し替え可能な診断サービス（モック/HTTP）の上に実装する。

pub mod asset;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod service;
pub mod workflow;

pub use asset::ImageAsset;
pub use error::{DiagnoseError, ErrorKind, Result};
pub use service::{DiagnosisService, HttpDiagnosisService, MockDiagnosisService, ServiceError};
pub use workflow::{DiagnosisWorkflow, Phase, WorkflowDriver, WorkflowError};
