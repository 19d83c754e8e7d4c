//! Error taxonomy for the REST boundary.
//!
//! Service and adapter layers return `ApiError` where the failure kind is
//! known; raw `anyhow`/`sqlx` errors convert into `Internal` and surface
//! their message verbatim in the `{error}` envelope. This daemon is an
//! internal tool — messages are intentionally not sanitized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing required field, empty update payload, or unknown enum value.
    #[error("{0}")]
    BadRequest(String),
    /// Id absent in the store, mirror file, or agent registry.
    #[error("{0}")]
    NotFound(String),
    /// Caller-supplied id collides with an existing record.
    #[error("{0}")]
    Conflict(String),
    /// Store or file I/O failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(err = %self, "internal error");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}
