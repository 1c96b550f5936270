//! Pathfinder Common Library
//!
//! CLIと将来のWeb UIで共有される型・結果表示・レスポンスパーサー

pub mod error;
pub mod parser;
pub mod presentation;
pub mod types;

pub use error::{Error, Result};
pub use parser::{parse_session_response, parse_status_response, parse_upload_response, JobStatus};
pub use presentation::{ResultReport, ResultView, DEFAULT_REVIEW_THRESHOLD};
pub use types::{ConfidenceLevel, JobHandle, ResultHandoff, ResultPayload};
