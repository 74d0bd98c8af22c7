//!
//! lansend upload handling
//! -----------------------
//! Accepts one incoming file per request: spools the multipart body to a
//! temp file in bounded chunks, runs the ordered validation sequence
//! (password, target directory, content, filename), then moves the bytes
//! into the share under a collision-safe name.
//!
//! Collision handling opens candidates with `create_new`, so two uploads
//! racing for the same name can never overwrite each other; the loser just
//! advances to the next `_n` suffix.
//!
//! Every attempt except a password-only probe emits exactly one upload log
//! line, success or failure.

use axum::body::Bytes;
use chrono::Local;
use futures_util::Stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::access::is_authorized;
use crate::config::ShareConfig;
use crate::error::{AppError, AppResult};
use crate::paths::{resolve_under_root, sanitize_filename};

/// Result of a stored upload, reported back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub stored_filename: String,
    /// True when a collision suffix was applied to the declared name.
    pub renamed: bool,
}

/// What an upload request produced: either a stored file or a successful
/// password probe (which never touches the filesystem).
#[derive(Debug)]
pub enum UploadResponse {
    PasswordOk,
    Stored(UploadOutcome),
}

/// One line of the append-only upload log.
#[derive(Debug, Clone)]
pub struct UploadLogEntry {
    pub timestamp: chrono::DateTime<Local>,
    pub client_ip: String,
    pub file_count: u32,
    pub status: String,
    pub relative_path: String,
    pub size: Option<u64>,
}

impl UploadLogEntry {
    fn line(&self) -> String {
        let path_str = if self.relative_path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.relative_path)
        };
        format!(
            "[{}] {} upload {} file(s), status: {}, path: {}, size: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.client_ip,
            self.file_count,
            self.status,
            path_str,
            format_size(self.size),
        )
    }
}

/// Append-only upload log sink. A single mutex serializes writers so each
/// line lands atomically under concurrent requests; nothing reads it back.
#[derive(Default)]
pub struct UploadLog {
    lines: Mutex<u64>,
}

impl UploadLog {
    pub fn new() -> Self {
        UploadLog { lines: Mutex::new(0) }
    }

    pub fn record(&self, entry: &UploadLogEntry) {
        let mut count = self.lines.lock();
        *count += 1;
        info!(target: "lansend::upload", "{}", entry.line());
    }

    /// Number of lines written so far. Test observability only.
    pub fn lines_written(&self) -> u64 {
        *self.lines.lock()
    }
}

/// Human-readable byte count for log lines.
pub fn format_size(num_bytes: Option<u64>) -> String {
    let Some(bytes) = num_bytes else {
        return "unknown size".to_string();
    };
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for (i, unit) in UNITS.iter().enumerate() {
        if size < 1024.0 || i == UNITS.len() - 1 {
            return if i == 0 {
                format!("{} {}", bytes, unit)
            } else {
                format!("{:.2} {}", size, unit)
            };
        }
        size /= 1024.0;
    }
    unreachable!()
}

static SPOOL_SEQ: AtomicU64 = AtomicU64::new(0);

/// An incoming file body spooled to a temp file outside the share.
/// The temp file is removed on drop, so failed uploads leave nothing behind.
#[derive(Debug)]
pub struct SpooledUpload {
    pub declared_name: String,
    pub temp_path: PathBuf,
    pub bytes_written: u64,
    /// Content-Length of the file part, when the client supplied one.
    pub content_length_hint: Option<u64>,
}

impl SpooledUpload {
    /// Drain `content` into a fresh temp file in bounded chunks.
    pub async fn spool<S, E>(
        declared_name: String,
        content_length_hint: Option<u64>,
        mut content: S,
    ) -> AppResult<Self>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let seq = SPOOL_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = std::env::temp_dir()
            .join(format!("lansend-upload-{}-{}", std::process::id(), seq));
        let mut file = File::create(&temp_path)
            .await
            .map_err(|e| AppError::write(format!("failed to spool upload: {e}")))?;

        let mut bytes_written: u64 = 0;
        while let Some(chunk) = content.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(AppError::write(format!("upload stream failed: {e}")));
                }
            };
            if chunk.is_empty() {
                continue;
            }
            bytes_written += chunk.len() as u64;
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(AppError::write(format!("failed to spool upload: {e}")));
            }
        }
        file.flush()
            .await
            .map_err(|e| AppError::write(format!("failed to spool upload: {e}")))?;

        Ok(SpooledUpload { declared_name, temp_path, bytes_written, content_length_hint })
    }
}

impl Drop for SpooledUpload {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.temp_path);
    }
}

/// Split a filename into stem and extension for suffixing.
/// A leading dot is part of the stem, so `.config` suffixes to `.config_1`.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

/// Open a file under `dir` with `create_new`, walking `base_1.ext`,
/// `base_2.ext`, ... until a free name is found.
async fn create_unique(dir: &Path, filename: &str) -> AppResult<(File, String, bool)> {
    let mut candidate = filename.to_string();
    let (stem, ext) = split_name(filename);
    let mut counter: u32 = 0;
    loop {
        let attempt = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
            .await;
        match attempt {
            Ok(file) => return Ok((file, candidate, counter > 0)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter += 1;
                candidate = format!("{}_{}{}", stem, counter, ext);
            }
            Err(e) => return Err(AppError::write(format!("failed to create file: {e}"))),
        }
    }
}

fn log_entry(
    client_ip: &str,
    file_count: u32,
    status: String,
    relative_path: &str,
    size: Option<u64>,
) -> UploadLogEntry {
    UploadLogEntry {
        timestamp: Local::now(),
        client_ip: client_ip.to_string(),
        file_count,
        status,
        relative_path: relative_path.to_string(),
        size,
    }
}

/// Accept one upload request.
///
/// `upload` is `None` when the request carried no file part; together with a
/// supplied password that makes the request a password probe, which answers
/// without touching the filesystem or the upload log. Everything else runs
/// the ordered check sequence and logs exactly once.
pub async fn accept(
    config: &ShareConfig,
    relative_dir: &str,
    upload: Option<SpooledUpload>,
    declared_size: Option<u64>,
    password: Option<&str>,
    client_ip: &str,
    log: &UploadLog,
) -> AppResult<UploadResponse> {
    let relative_dir = relative_dir.trim_matches('/');

    // Password probe: password field only, no file content.
    if upload.is_none() && password.is_some() {
        return match config.upload_password.as_deref() {
            None => Err(AppError::bad_request("upload password not set")),
            Some(_) if is_authorized(config.upload_password.as_deref(), password) => {
                Ok(UploadResponse::PasswordOk)
            }
            Some(_) => Err(AppError::auth_invalid("wrong password")),
        };
    }

    if config.require_password() {
        if password.is_none() {
            log.record(&log_entry(
                client_ip,
                0,
                "failed (upload password required)".to_string(),
                relative_dir,
                None,
            ));
            return Err(AppError::auth_required("upload password required"));
        }
        if !is_authorized(config.upload_password.as_deref(), password) {
            log.record(&log_entry(
                client_ip,
                0,
                "failed (wrong password)".to_string(),
                relative_dir,
                None,
            ));
            return Err(AppError::auth_invalid("wrong password"));
        }
    }

    let target_dir = match resolve_under_root(&config.shared_root, relative_dir) {
        Ok(dir) => dir,
        Err(AppError::Config { .. }) => {
            log.record(&log_entry(
                client_ip,
                0,
                "failed (shared directory not set)".to_string(),
                relative_dir,
                None,
            ));
            return Err(AppError::config("shared directory not set"));
        }
        Err(_) => {
            log.record(&log_entry(
                client_ip,
                0,
                "failed (invalid path)".to_string(),
                relative_dir,
                None,
            ));
            return Err(AppError::bad_request("invalid path"));
        }
    };
    if !target_dir.is_dir() {
        let shown = if relative_dir.is_empty() { "root" } else { relative_dir };
        log.record(&log_entry(
            client_ip,
            0,
            format!("failed (target directory missing: {shown})"),
            relative_dir,
            None,
        ));
        return Err(AppError::not_found("target directory not found"));
    }

    let Some(upload) = upload else {
        log.record(&log_entry(
            client_ip,
            0,
            "failed (no file field)".to_string(),
            relative_dir,
            None,
        ));
        return Err(AppError::bad_request("missing file"));
    };

    if upload.declared_name.is_empty() {
        log.record(&log_entry(
            client_ip,
            0,
            "failed (no file selected)".to_string(),
            relative_dir,
            None,
        ));
        return Err(AppError::bad_request("no file selected"));
    }

    // Best-effort size for the log line: declared size from the form, then
    // the file part's content-length, then what was actually spooled.
    let size = declared_size
        .or(upload.content_length_hint)
        .or(Some(upload.bytes_written));

    let filename = sanitize_filename(&upload.declared_name);
    let (mut target, stored_filename, renamed) = match create_unique(&target_dir, &filename).await {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "lansend::upload", "create failed in '{}': {}", target_dir.display(), e);
            log.record(&log_entry(
                client_ip,
                1,
                format!("failed (save failed: {e})"),
                relative_dir,
                size,
            ));
            return Err(AppError::write("failed to save file"));
        }
    };

    let mut spooled = match File::open(&upload.temp_path).await {
        Ok(f) => f,
        Err(e) => {
            let _ = tokio::fs::remove_file(target_dir.join(&stored_filename)).await;
            log.record(&log_entry(
                client_ip,
                1,
                format!("failed (save failed: {e})"),
                relative_dir,
                size,
            ));
            return Err(AppError::write("failed to save file"));
        }
    };
    if let Err(e) = tokio::io::copy(&mut spooled, &mut target).await {
        let _ = tokio::fs::remove_file(target_dir.join(&stored_filename)).await;
        warn!(target: "lansend::upload", "write failed for '{}': {}", stored_filename, e);
        log.record(&log_entry(
            client_ip,
            1,
            format!("failed (save failed: {e})"),
            relative_dir,
            size,
        ));
        return Err(AppError::write("failed to save file"));
    }
    if let Err(e) = target.flush().await {
        let _ = tokio::fs::remove_file(target_dir.join(&stored_filename)).await;
        log.record(&log_entry(
            client_ip,
            1,
            format!("failed (save failed: {e})"),
            relative_dir,
            size,
        ));
        return Err(AppError::write("failed to save file"));
    }

    log.record(&log_entry(
        client_ip,
        1,
        format!("success ({stored_filename})"),
        relative_dir,
        size,
    ));
    Ok(UploadResponse::Stored(UploadOutcome { stored_filename, renamed }))
}
