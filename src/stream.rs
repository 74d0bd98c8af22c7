//!
//! lansend byte streaming
//! ----------------------
//! Serves file bytes with HTTP `Range` support so clients can seek and
//! resume. Bodies are produced in fixed-size chunks; per-request memory is
//! independent of file size. The chunk source is pulled by the connection,
//! so a disconnect stops disk reads within one chunk.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::paths::resolve_under_root;

/// Fixed read chunk for streamed bodies.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Inclusive byte window within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the window; never zero for a parsed range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// A ready-to-send streaming response: status, headers and chunked body.
#[derive(Debug)]
pub struct StreamedFile {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// Returns `Ok(None)` for an absent or syntactically unusable header (the
/// full file is served), `Ok(Some(range))` for a satisfiable window, and
/// `RangeUnsatisfiable` when `start >= size` or `end >= size`. The suffix
/// form `bytes=-n` addresses the final `n` bytes.
pub fn parse_range(header: Option<&str>, size: u64) -> AppResult<Option<ByteRange>> {
    let Some(value) = header else {
        return Ok(None);
    };
    let Some(spec) = value.strip_prefix("bytes=") else {
        return Ok(None);
    };
    if spec.contains(',') {
        // Multi-range requests are not supported; serve the full file.
        return Ok(None);
    }

    let (start_part, end_part) = match spec.split_once('-') {
        Some(parts) => parts,
        None => return Ok(None),
    };

    if start_part.is_empty() {
        // Suffix form: the last `n` bytes.
        let Ok(suffix) = end_part.trim().parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(AppError::range_unsatisfiable(size));
        }
        return Ok(Some(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }));
    }

    let Ok(start) = start_part.trim().parse::<u64>() else {
        return Ok(None);
    };
    let end = if end_part.trim().is_empty() {
        size.saturating_sub(1)
    } else {
        match end_part.trim().parse::<u64>() {
            Ok(v) => v,
            Err(_) => return Ok(None),
        }
    };

    if start >= size || end >= size || start > end {
        return Err(AppError::range_unsatisfiable(size));
    }
    Ok(Some(ByteRange { start, end }))
}

fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Open `relative` under `root` and build a 200 or 206 streaming response
/// honoring `range_header`. Fails with `NotFound` for directories and
/// missing or escaped paths.
pub async fn serve_file(
    root: &Path,
    relative: &str,
    range_header: Option<&str>,
) -> AppResult<StreamedFile> {
    let path = resolve_under_root(root, relative)?;
    if !path.is_file() {
        return Err(AppError::not_found("File not found"));
    }
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::not_found("File not found"))?;
    let size = metadata.len();

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    headers.insert(header::CONTENT_TYPE, header_value(mime.essence_str()));

    let mut file = File::open(&path)
        .await
        .map_err(|_| AppError::not_found("File not found"))?;

    match parse_range(range_header, size)? {
        Some(range) => {
            file.seek(SeekFrom::Start(range.start))
                .await
                .map_err(|e| AppError::write(format!("seek failed: {e}")))?;
            let stream = ReaderStream::with_capacity(file.take(range.len()), CHUNK_SIZE);
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes {}-{}/{}", range.start, range.end, size)),
            );
            headers.insert(header::CONTENT_LENGTH, header_value(&range.len().to_string()));
            Ok(StreamedFile {
                status: StatusCode::PARTIAL_CONTENT,
                headers,
                body: Body::from_stream(stream),
            })
        }
        None => {
            headers.insert(header::CONTENT_LENGTH, header_value(&size.to_string()));
            let stream = ReaderStream::with_capacity(file, CHUNK_SIZE);
            Ok(StreamedFile {
                status: StatusCode::OK,
                headers,
                body: Body::from_stream(stream),
            })
        }
    }
}
