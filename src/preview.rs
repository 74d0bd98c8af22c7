//! Inline file-content inspection backing `GET /api/file`.
//! Text files are returned inline; images and binaries are flagged so the
//! client fetches them through the byte-stream endpoints instead.

use serde::Serialize;
use std::path::Path;
use tokio::fs;

use crate::error::{AppError, AppResult};
use crate::paths::resolve_under_root;

const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tiff", "tif"];

/// Extension-based image detection, matching the share UI's preview rules.
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Payload for `GET /api/file`. Exactly one of `content`, `is_image`,
/// `is_binary` carries the interesting signal.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_image: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_binary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn base_name(relative: &str) -> String {
    relative.rsplit('/').next().unwrap_or(relative).to_string()
}

/// Read a file for inline display. Images are flagged without reading bytes;
/// non-UTF-8 content is flagged as binary rather than embedded.
pub async fn read_file_content(root: &Path, relative: &str) -> AppResult<FileContent> {
    let file_path = resolve_under_root(root, relative)?;
    if !file_path.is_file() {
        return Err(AppError::not_found("File not found"));
    }

    let name = base_name(relative);
    if is_image_file(relative) {
        return Ok(FileContent {
            path: relative.to_string(),
            name,
            content: None,
            is_image: Some(true),
            is_binary: None,
            error: None,
        });
    }

    let bytes = fs::read(&file_path)
        .await
        .map_err(|e| AppError::write(format!("failed to read file: {e}")))?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(FileContent {
            path: relative.to_string(),
            name,
            content: Some(content),
            is_image: Some(false),
            is_binary: None,
            error: None,
        }),
        Err(_) => Ok(FileContent {
            path: relative.to_string(),
            name,
            content: None,
            is_image: None,
            is_binary: Some(true),
            error: Some("Binary file cannot be displayed".to_string()),
        }),
    }
}
