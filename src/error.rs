//! Unified application error model and HTTP mapping.
//! Every request-local failure in the sharing core flows through `AppError`;
//! the route layer converts it to a JSON error response via `IntoResponse`.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Shared root unset or unusable. Surfaced per-request, never cached.
    Config { message: String },
    /// Malformed request input (missing file part, empty filename, ...).
    BadRequest { message: String },
    /// Resolved path landed outside the shared root. Deliberately reported
    /// with the same status as NotFound so the response never confirms that
    /// anything exists beyond the sandbox.
    PathEscape { message: String },
    /// Missing file or directory inside the shared root.
    NotFound { message: String },
    /// Upload password configured but not supplied.
    AuthRequired { message: String },
    /// Upload password supplied but wrong.
    AuthInvalid { message: String },
    /// Requested byte range cannot be satisfied for a file of `size` bytes.
    RangeUnsatisfiable { size: u64 },
    /// Disk error while saving an upload. Full detail goes to the server log
    /// only; clients get the stored generic message.
    Write { message: String },
}

impl AppError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Config { message: msg.into() }
    }
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        AppError::BadRequest { message: msg.into() }
    }
    pub fn path_escape<S: Into<String>>(msg: S) -> Self {
        AppError::PathEscape { message: msg.into() }
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound { message: msg.into() }
    }
    pub fn auth_required<S: Into<String>>(msg: S) -> Self {
        AppError::AuthRequired { message: msg.into() }
    }
    pub fn auth_invalid<S: Into<String>>(msg: S) -> Self {
        AppError::AuthInvalid { message: msg.into() }
    }
    pub fn range_unsatisfiable(size: u64) -> Self {
        AppError::RangeUnsatisfiable { size }
    }
    pub fn write<S: Into<String>>(msg: S) -> Self {
        AppError::Write { message: msg.into() }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Config { message }
            | AppError::BadRequest { message }
            | AppError::PathEscape { message }
            | AppError::NotFound { message }
            | AppError::AuthRequired { message }
            | AppError::AuthInvalid { message }
            | AppError::Write { message } => message.clone(),
            AppError::RangeUnsatisfiable { .. } => "range not satisfiable".to_string(),
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Config { .. } => StatusCode::BAD_REQUEST,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            // PathEscape is 404 on purpose, not 403.
            AppError::PathEscape { .. } => StatusCode::NOT_FOUND,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AuthRequired { .. } => StatusCode::UNAUTHORIZED,
            AppError::AuthInvalid { .. } => StatusCode::UNAUTHORIZED,
            AppError::RangeUnsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Write { message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RangeUnsatisfiable { size } => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
            }
            ref err => {
                let status = err.http_status();
                (status, Json(serde_json::json!({ "error": err.message() }))).into_response()
            }
        }
    }
}
