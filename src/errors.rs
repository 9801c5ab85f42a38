use crate::services::storage_service::StorageError;
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// Body returned for every rejected upload.
pub const UPLOAD_FAILED_MESSAGE: &str = "Erro ao realizar upload";

/// Body returned when an upload was parsed but could not be written.
pub const STORAGE_FAILED_MESSAGE: &str = "Erro ao salvar arquivo";

/// Why an upload request could not be turned into an `UploadedFile`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("request is not multipart/form-data: {0}")]
    NotMultipart(#[from] MultipartRejection),
    #[error("malformed multipart body: {0}")]
    Malformed(#[from] MultipartError),
    #[error("no `{0}` field in form")]
    MissingField(&'static str),
    #[error("field `{0}` sent more than once")]
    DuplicateField(&'static str),
    #[error("unexpected file field `{0}`")]
    UnexpectedField(String),
}

/// A lightweight wrapper for errors that keeps the cause server-side and
/// sends only a fixed plain-text message.
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

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
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
        (self.status, self.message).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        tracing::warn!("rejected upload: {}", err);
        AppError::bad_request(UPLOAD_FAILED_MESSAGE)
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        ValidationError::from(rejection).into()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!("failed to store upload: {}", err);
        AppError::internal(STORAGE_FAILED_MESSAGE)
    }
}
