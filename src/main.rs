use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use lansend::config::ShareConfig;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let port: u16 = std::env::var("LANSEND_PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .context("LANSEND_PORT must be a port number")?;
    let directory = std::env::var("LANSEND_DIR").unwrap_or_else(|_| ".".to_string());
    info!(
        target: "lansend",
        "lansend starting: RUST_LOG='{}', port={}, directory='{}'",
        rust_log, port, directory
    );

    let dir = PathBuf::from(&directory);
    anyhow::ensure!(dir.exists(), "Directory {} does not exist", directory);
    anyhow::ensure!(dir.is_dir(), "{} is not a directory", directory);
    let shared_root = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve shared directory: {}", directory))?;

    let mut config = ShareConfig::new(shared_root);
    if let Ok(name) = std::env::var("LANSEND_NAME") {
        if !name.trim().is_empty() {
            config.display_name = name;
        }
    }
    if let Ok(password) = std::env::var("LANSEND_UPLOAD_PASSWORD") {
        if !password.is_empty() {
            config.upload_password = Some(password);
        }
    }
    config.allow_upload = !env_flag("LANSEND_NO_UPLOAD");
    config.allow_download = !env_flag("LANSEND_NO_DOWNLOAD");

    lansend::server::run_with_config(port, config).await
}
