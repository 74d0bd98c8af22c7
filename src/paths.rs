//!
//! lansend path resolution
//! -----------------------
//! Validates untrusted client-supplied relative paths against the shared root.
//! Every filesystem operation in the crate goes through `resolve_under_root`;
//! nothing else may build an on-disk path from request input.
//!
//! Resolution is symlink-aware for the part of the path that exists: the
//! deepest existing ancestor is canonicalized and the remaining (lexically
//! cleaned) segments are re-attached, so upload targets that do not exist yet
//! are still confined to the root.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Characters allowed in stored filenames: word characters, whitespace,
/// CJK Unified Ideographs, hyphen and dot. Everything else is stripped.
static FILENAME_KEEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\x{4e00}-\x{9fff}\-.]").unwrap());

/// Fallback name when sanitization strips a filename down to nothing.
pub const UNTITLED: &str = "untitled";

/// Reduce a declared filename to its allowed character classes.
/// Purely character-class filtering; extensions get no special treatment.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = FILENAME_KEEP.replace_all(name, "").into_owned();
    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned
    }
}

/// True for inputs that name an absolute location on any platform:
/// rooted paths, drive-letter prefixes (`C:...`) and UNC prefixes (`\\host`).
fn looks_absolute(relative: &str) -> bool {
    if relative.starts_with('/') || relative.starts_with('\\') {
        return true;
    }
    let bytes = relative.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Split a client path on `/` (and `\`, which clients on Windows sometimes
/// send), drop empty and `.` segments, and apply `..` lexically. `..` that
/// would climb above the root is a path escape.
fn clean_segments(relative: &str) -> AppResult<Vec<&str>> {
    let mut stack: Vec<&str> = Vec::new();
    for seg in relative.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(AppError::path_escape("invalid path"));
                }
            }
            other => stack.push(other),
        }
    }
    Ok(stack)
}

/// Resolve a client-relative path against the shared root.
///
/// Returns the absolute on-disk path, which is guaranteed to be the root
/// itself or a descendant of it after symlink resolution. Fails with
/// `PathEscape` for absolute inputs, `..` climbing, or symlinks pointing
/// outside the root, and with `Config` when the root itself is unusable.
pub fn resolve_under_root(root: &Path, relative: &str) -> AppResult<PathBuf> {
    if looks_absolute(relative) {
        return Err(AppError::path_escape("invalid path"));
    }
    let segments = clean_segments(relative)?;

    let canonical_root = root
        .canonicalize()
        .map_err(|_| AppError::config("shared directory not set"))?;

    let mut resolved = canonical_root.clone();
    for (i, seg) in segments.iter().enumerate() {
        resolved.push(seg);
        if resolved.exists() {
            // Chase symlinks in the existing portion as we go.
            resolved = resolved
                .canonicalize()
                .map_err(|_| AppError::not_found("file not found"))?;
            if !resolved.starts_with(&canonical_root) {
                return Err(AppError::path_escape("invalid path"));
            }
        } else {
            // Remainder does not exist; attach it lexically. clean_segments
            // already removed every `.`/`..`, so no further checks needed.
            for rest in &segments[i + 1..] {
                resolved.push(rest);
            }
            break;
        }
    }

    if !resolved.starts_with(&canonical_root) {
        return Err(AppError::path_escape("invalid path"));
    }
    Ok(resolved)
}
