use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::schema::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] hoard_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Transport-level failure returned by a handler.
///
/// The message is sent to the client as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 422: the request is well-formed HTTP but names no valid hash or file.
    #[error("{0}")]
    Validation(String),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 413
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 500
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
