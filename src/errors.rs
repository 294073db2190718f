use crate::{services::browser_service::BrowserError, store::StoreError};
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

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
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
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<BrowserError> for AppError {
    fn from(err: BrowserError) -> Self {
        let message = err.to_string();
        match err {
            BrowserError::NotFound(_) => AppError::not_found(message),
            BrowserError::InvalidPath { .. }
            | BrowserError::AmbiguousMatch { .. }
            | BrowserError::InvalidContent(_)
            | BrowserError::InvalidChunk { .. } => AppError::bad_request(message),
            BrowserError::Backend(StoreError::Timeout) => {
                AppError::new(StatusCode::GATEWAY_TIMEOUT, message)
            }
            BrowserError::Backend(_) => AppError::internal(message),
        }
    }
}
