use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("request cancelled")]
    Cancelled,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing composite index: {0}")]
    IndexUnavailable(String),

    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    /// Errors that will not change by asking the store again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AppError::Cancelled
                | AppError::PermissionDenied(_)
                | AppError::InvalidInput(_)
                | AppError::NotFound(_)
                | AppError::InvalidTransition { .. }
                | AppError::Unauthorized
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::PermissionDenied(msg) => AppError::PermissionDenied(msg),
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::InvalidInput(msg) => AppError::InvalidInput(msg),
            StoreError::IndexUnavailable(index) => AppError::IndexUnavailable(index),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::IndexUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
