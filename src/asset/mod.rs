//! 画像アセット
//!
//! ユーザーが選択した画像（ファイル選択またはドラッグ&ドロップ）。
//! 1回の診断試行の間だけワークフローが所有する。

use crate::error::{DiagnoseError, Result};
use image::ImageFormat;
use reqwest::Url;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct ImageAsset {
    content: Arc<[u8]>,
    media_type: String,
    name: String,
    display_url: String,
}

impl ImageAsset {
    /// メモリ上のデータから生成（ドロップされたファイル等）
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let display_url = format!("blob:pathfinder/{}", name);
        Self {
            content: content.into(),
            media_type: media_type.into(),
            name,
            display_url,
        }
    }

    /// ファイルから読み込み
    ///
    /// メディアタイプは拡張子から判定し、不明なら application/octet-stream。
    /// 画像かどうかの判定は選択時にワークフローが行う。
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DiagnoseError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read(path)?;
        let media_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type())
            .unwrap_or(FALLBACK_MEDIA_TYPE);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let abs_path = std::fs::canonicalize(path)?;
        let display_url = Url::from_file_path(&abs_path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| abs_path.display().to_string());

        Ok(Self {
            content: content.into(),
            media_type: media_type.to_string(),
            name,
            display_url,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn display_url(&self) -> &str {
        &self.display_url
    }

    /// `image/*` かどうか
    pub fn is_image(&self) -> bool {
        is_image_media_type(&self.media_type)
    }

    /// 表示用サイズ（"2.00 MB"）
    pub fn display_size(&self) -> String {
        format!("{:.2} MB", self.size() as f64 / 1024.0 / 1024.0)
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.content.len())
            .finish()
    }
}

pub fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("image/"))
        .unwrap_or(false)
        && media_type.len() > 6
}
