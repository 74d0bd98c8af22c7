//!
//! lansend HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for the shared directory.
//!
//! Responsibilities:
//! - Route table for browsing, preview/download streaming and uploads.
//! - Request parsing (query strings, wildcard paths, multipart forms) and
//!   JSON serialization of core results.
//! - Mapping `AppError` values to HTTP responses.
//! - Startup logging and listener setup.
//!
//! All filesystem work is delegated to the core modules; handlers only move
//! data between the wire and those functions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{
    connect_info::ConnectInfo, DefaultBodyLimit, Multipart, Path as UrlPath, Query, State,
};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::ShareConfig;
use crate::error::AppError;
use crate::listing::{self, DirEntryInfo, PathPart, TreeNode};
use crate::preview;
use crate::stream;
use crate::upload::{self, SpooledUpload, UploadLog, UploadResponse};

/// Shared server state injected into all handlers.
///
/// `config` is immutable after startup; `upload_log` is the append-only
/// upload log sink. Both are safely shared across concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ShareConfig>,
    pub upload_log: Arc<UploadLog>,
}

impl AppState {
    pub fn new(config: ShareConfig) -> Self {
        AppState {
            config: Arc::new(config),
            upload_log: Arc::new(UploadLog::new()),
        }
    }
}

fn log_startup(config: &ShareConfig, port: u16) {
    info!(
        target: "startup",
        "lansend starting: shared_root='{}', display_name='{}', password={}, upload={}, download={}, port={}",
        config.shared_root.display(),
        config.display_name,
        if config.require_password() { "enabled" } else { "disabled" },
        config.allow_upload,
        config.allow_download,
        port,
    );
}

/// Build the application router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "lansend ok" }))
        .route("/api/directory", get(api_directory))
        .route("/api/tree", get(api_tree))
        .route("/api/file/{*path}", get(api_file))
        .route("/api/preview/{*path}", get(api_preview))
        .route("/api/download/{*path}", get(api_download))
        .route("/upload", post(upload_file).layer(DefaultBodyLimit::disable()))
        .with_state(state)
}

/// Start the lansend HTTP server bound to the given port.
pub async fn run_with_config(port: u16, config: ShareConfig) -> anyhow::Result<()> {
    log_startup(&config, port);
    let app = router(AppState::new(config));

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct DirectoryQuery {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct DirectoryListing {
    display_name: String,
    share_name: String,
    relative_path: String,
    path_parts: Vec<PathPart>,
    items: Vec<DirEntryInfo>,
    require_password: bool,
}

async fn api_directory(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<DirectoryListing>, AppError> {
    let relative = query.path.unwrap_or_default();
    let relative = relative.trim_matches('/').to_string();
    let items = listing::list_directory(&state.config.shared_root, &relative)?;
    Ok(Json(DirectoryListing {
        display_name: state.config.display_name.clone(),
        share_name: state.config.share_name(),
        relative_path: relative.clone(),
        path_parts: listing::path_parts(&relative),
        items,
        require_password: state.config.require_password(),
    }))
}

#[derive(Debug, serde::Serialize)]
struct TreeReply {
    tree: Vec<TreeNode>,
}

async fn api_tree(State(state): State<AppState>) -> Result<Json<TreeReply>, AppError> {
    let tree = listing::directory_tree(&state.config.shared_root)?;
    Ok(Json(TreeReply { tree }))
}

async fn api_file(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> Result<Response, AppError> {
    let content = preview::read_file_content(&state.config.shared_root, &path).await?;
    Ok(Json(content).into_response())
}

async fn api_preview(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let out = stream::serve_file(&state.config.shared_root, &path, range).await?;
    Ok((out.status, out.headers, out.body).into_response())
}

async fn api_download(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if !state.config.allow_download {
        return Err(AppError::not_found("File not found"));
    }
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let mut out = stream::serve_file(&state.config.shared_root, &path, range).await?;

    let name = path.rsplit('/').next().unwrap_or(&path);
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        out.headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((out.status, out.headers, out.body).into_response())
}

/// Multipart form fields accepted by `POST /upload`.
#[derive(Default)]
struct UploadForm {
    relative_dir: String,
    declared_size: Option<u64>,
    password: Option<String>,
    file: Option<SpooledUpload>,
}

async fn parse_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(AppError::bad_request(format!("upload failed: {e}"))),
        };
        match field.name().unwrap_or("") {
            "path" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("upload failed: {e}")))?;
                form.relative_dir = text.trim_matches('/').to_string();
            }
            "size" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("upload failed: {e}")))?;
                form.declared_size = text.trim().parse::<u64>().ok();
            }
            "password" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("upload failed: {e}")))?;
                form.password = Some(text);
            }
            "file" => {
                let declared_name = field.file_name().unwrap_or("").to_string();
                let content_length_hint = field
                    .headers()
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                let chunks = Box::pin(futures_util::stream::unfold(field, |mut field| async move {
                    match field.chunk().await {
                        Ok(Some(bytes)) => Some((Ok(bytes), field)),
                        Ok(None) => None,
                        Err(e) => Some((Err(e), field)),
                    }
                }));
                form.file =
                    Some(SpooledUpload::spool(declared_name, content_length_hint, chunks).await?);
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn upload_file(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    multipart: Multipart,
) -> Response {
    if !state.config.allow_upload {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "upload disabled" })))
            .into_response();
    }

    let client_ip = addr.ip().to_string();
    let form = match parse_upload_form(multipart).await {
        Ok(form) => form,
        Err(err) => {
            error!(target: "lansend::upload", "multipart parse failed from {}: {}", client_ip, err);
            return err.into_response();
        }
    };

    let result = upload::accept(
        &state.config,
        &form.relative_dir,
        form.file,
        form.declared_size,
        form.password.as_deref(),
        &client_ip,
        &state.upload_log,
    )
    .await;

    match result {
        Ok(UploadResponse::Stored(out)) => (
            StatusCode::OK,
            Json(json!({
                "message": "file uploaded",
                "filename": out.stored_filename,
                "renamed": out.renamed,
            })),
        )
            .into_response(),
        Ok(UploadResponse::PasswordOk) => {
            (StatusCode::OK, Json(json!({ "message": "password ok" }))).into_response()
        }
        Err(err) => {
            // The upload API reports a missing target directory as a client
            // error, not 404; the browse endpoints keep the 404 mapping.
            let status = match &err {
                AppError::NotFound { .. } => StatusCode::BAD_REQUEST,
                other => other.http_status(),
            };
            (status, Json(json!({ "error": err.message() }))).into_response()
        }
    }
}
