use crate::error::{DiagnoseError, Result};
use crate::service::{HttpServiceOptions, RetryConfig};
use pathfinder_common::DEFAULT_REVIEW_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "PATHFINDER_API_URL";
pub const ENV_SESSION_ID: &str = "PATHFINDER_SESSION_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub session_id: Option<String>,
    pub task_type: TaskType,
    pub review_threshold: f64,
    pub max_upload_bytes: u64,
    pub poll_interval_ms: u64,
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Classification,
    Segmentation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Segmentation => "segmentation",
        }
    }
}

/// 診断セッションの疾患種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseType {
    #[default]
    Tuberculosis,
    Parasites,
    Schistosomiasis,
    Fungal,
    BloodAbnormalities,
}

impl DiseaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseType::Tuberculosis => "tuberculosis",
            DiseaseType::Parasites => "parasites",
            DiseaseType::Schistosomiasis => "schistosomiasis",
            DiseaseType::Fungal => "fungal",
            DiseaseType::BloodAbnormalities => "blood_abnormalities",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            session_id: None,
            task_type: TaskType::Classification,
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            max_upload_bytes: 10 * 1024 * 1024,
            poll_interval_ms: 1000,
            timeout_seconds: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// ファイルがなければデフォルト
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DiagnoseError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("pathfinder").join("config.json"))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        if let Ok(session) = std::env::var(ENV_SESSION_ID) {
            if !session.trim().is_empty() {
                self.session_id = Some(session);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.review_threshold)?;
        if self.poll_interval_ms == 0 {
            return Err(DiagnoseError::Config("poll_interval_msは1以上にしてください".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(DiagnoseError::Config("timeout_secondsは1以上にしてください".into()));
        }
        Ok(())
    }

    pub fn set_api_url(&mut self, url: String) -> Result<()> {
        self.api_url = url;
        self.save()
    }

    pub fn set_session_id(&mut self, session_id: String) -> Result<()> {
        self.session_id = Some(session_id);
        self.save()
    }

    pub fn set_task_type(&mut self, task_type: TaskType) -> Result<()> {
        self.task_type = task_type;
        self.save()
    }

    pub fn set_review_threshold(&mut self, threshold: f64) -> Result<()> {
        validate_threshold(threshold)?;
        self.review_threshold = threshold;
        self.save()
    }

    pub fn http_options(&self) -> HttpServiceOptions {
        HttpServiceOptions {
            api_url: self.api_url.clone(),
            session_id: self.session_id.clone().unwrap_or_default(),
            task_type: self.task_type.as_str().to_string(),
            max_upload_bytes: self.max_upload_bytes,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_seconds),
            retry: self.retry.clone(),
        }
    }
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(DiagnoseError::Config(format!(
            "review_thresholdは0.0〜1.0で指定してください: {}",
            threshold
        )));
    }
    Ok(())
}
