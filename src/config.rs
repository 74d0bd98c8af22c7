//! Immutable server configuration.
//! Built once at startup from the command environment and shared read-only
//! across all request handlers; the core components never mutate it.

use std::path::PathBuf;

/// Settings for one sharing session. `shared_root` is the sandbox boundary:
/// every path the server ever touches must resolve to a descendant of it.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    /// Absolute path of the directory exposed to clients.
    pub shared_root: PathBuf,
    /// Name shown in the directory listing header.
    pub display_name: String,
    /// Optional shared upload password. `None` disables the gate entirely.
    pub upload_password: Option<String>,
    /// When false, `POST /upload` is rejected outright.
    pub allow_upload: bool,
    /// When false, the download endpoint answers 404.
    pub allow_download: bool,
}

impl ShareConfig {
    pub fn new(shared_root: PathBuf) -> Self {
        ShareConfig {
            shared_root,
            display_name: "Shared Folder".to_string(),
            upload_password: None,
            allow_upload: true,
            allow_download: true,
        }
    }

    /// Basename of the shared root, shown to clients as the share name.
    pub fn share_name(&self) -> String {
        self.shared_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.shared_root.to_string_lossy().into_owned())
    }

    pub fn require_password(&self) -> bool {
        self.upload_password.is_some()
    }
}
