//!
//! lansend directory enumeration
//! -----------------------------
//! Flat single-level listings and recursive tree snapshots of the shared
//! root. Listing order is fixed: directories before files, then
//! case-insensitive name ascending. All returned paths are client-relative
//! and `/`-separated regardless of host platform.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::paths::resolve_under_root;

/// One entry of a single-level listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntryInfo {
    pub name: String,
    /// Relative to the shared root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
}

/// One node of a recursive tree. Directories carry `children`; files omit it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Breadcrumb segment for a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPart {
    pub name: String,
    /// Cumulative relative path up to and including this segment.
    pub path: String,
}

/// Split a relative path into breadcrumb parts. Always `/`-separated; a
/// platform separator here would break client-side path joining.
pub fn path_parts(relative: &str) -> Vec<PathPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        if current.is_empty() {
            current = part.to_string();
        } else {
            current = format!("{current}/{part}");
        }
        parts.push(PathPart { name: part.to_string(), path: current.clone() });
    }
    parts
}

fn join_relative(relative: &str, name: &str) -> String {
    if relative.is_empty() {
        name.to_string()
    } else {
        format!("{relative}/{name}")
    }
}

fn sort_entries<T, F: Fn(&T) -> (bool, String)>(items: &mut [T], key: F) {
    items.sort_by_key(|item| {
        let (is_dir, name) = key(item);
        (!is_dir, name.to_lowercase())
    });
}

/// One-level snapshot of `relative_dir` under `root`.
/// Fails with `NotFound` when the resolved path is missing or not a directory.
pub fn list_directory(root: &Path, relative_dir: &str) -> AppResult<Vec<DirEntryInfo>> {
    let relative_dir = relative_dir.trim_matches('/');
    let dir = resolve_under_root(root, relative_dir)?;
    if !dir.is_dir() {
        return Err(AppError::not_found("Directory not found"));
    }

    let mut items = Vec::new();
    let entries = fs::read_dir(&dir).map_err(|_| AppError::not_found("Directory not found"))?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.path().is_dir();
        items.push(DirEntryInfo {
            path: join_relative(relative_dir, &name),
            name,
            is_dir,
        });
    }
    sort_entries(&mut items, |e| (e.is_dir, e.name.clone()));
    Ok(items)
}

/// Depth-first recursive tree of the whole shared root.
///
/// Directories already visited (by canonical path) are listed but not
/// descended into again, so symlink cycles cannot recurse forever.
pub fn directory_tree(root: &Path) -> AppResult<Vec<TreeNode>> {
    let base = resolve_under_root(root, "")?;
    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(base.clone());
    Ok(build_tree(&base, "", &mut visited))
}

fn build_tree(dir: &Path, relative: &str, visited: &mut HashSet<PathBuf>) -> Vec<TreeNode> {
    let mut nodes = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return nodes;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let full = entry.path();
        let is_dir = full.is_dir();
        let item_path = join_relative(relative, &name);

        let children = if is_dir {
            let expand = match full.canonicalize() {
                Ok(canonical) => visited.insert(canonical),
                Err(_) => false,
            };
            if expand {
                Some(build_tree(&full, &item_path, visited))
            } else {
                Some(Vec::new())
            }
        } else {
            None
        };

        nodes.push(TreeNode { name, path: item_path, is_dir, children });
    }
    sort_entries(&mut nodes, |n| (n.is_dir, n.name.clone()));
    nodes
}
