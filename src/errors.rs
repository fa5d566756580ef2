use crate::services::{media_service::MediaError, storage_root::StorageRootError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Maps the service-layer taxonomy onto HTTP statuses so handlers can bubble
/// `MediaError` with `?`.
impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        let status = match &err {
            MediaError::EmptyFile => StatusCode::BAD_REQUEST,
            MediaError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            MediaError::NotAnImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MediaError::Storage(StorageRootError::UnsafeName(_)) => StatusCode::BAD_REQUEST,
            MediaError::MediaNotFound(_) | MediaError::FileMissing(_) => StatusCode::NOT_FOUND,
            MediaError::NotOwner(_) => StatusCode::FORBIDDEN,
            MediaError::Storage(StorageRootError::Io(_)) | MediaError::Sqlx(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}
