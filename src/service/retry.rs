//! ステータス確認のリトライ/バックオフ設定

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// リトライ設定（デフォルト: 3回 + ジッター付き指数バックオフ）
///
/// `max_attempts` は初回を含む試行回数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 300,
            max_backoff_ms: 5000,
        }
    }
}

impl RetryConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// 少なくとも1回はリトライする
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(2)
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    pub fn should_retry_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    /// attempt回目（1始まり）の後の待ち時間
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self.base_backoff().saturating_mul(2u32.saturating_pow(exp));
        let capped = base.min(self.max_backoff());
        let jitter = 0.5 + fastrand::f64(); // 0.5x .. 1.5x
        let seconds = (capped.as_secs_f64() * jitter).min(self.max_backoff().as_secs_f64());
        Duration::from_secs_f64(seconds)
    }
}
