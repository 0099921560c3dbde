//! API error type with structured JSON responses.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::extraction::ExtractError;

/// Error response body: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The request body could not be read as a multipart form.
    #[error("Invalid upload: {message}")]
    InvalidUpload { status: StatusCode, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Failed to read receipt image: {0}")]
    ImageUnreadable(#[source] std::io::Error),
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::InvalidUpload {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::InvalidUpload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Extract(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Extract(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidUpload { status, .. } => *status,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ImageUnreadable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Extract(e) => e.kind(),
            ApiError::InvalidUpload { .. } => "InvalidUpload",
            ApiError::NotFound => "NotFound",
            ApiError::ImageUnreadable(_) => "StorageFailure",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
