//! Error types for the battle engine and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced match or turn does not exist.
    #[error("not found")]
    NotFound,

    /// Caller is not the authorized actor for this action.
    #[error("forbidden")]
    Forbidden,

    /// Action is not valid for the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Structurally invalid challenge (e.g. challenging yourself).
    #[error("invalid challenge: {0}")]
    InvalidChallenge(&'static str),

    /// Judging arrived after the turn's judging deadline. The forced
    /// forfeiture has already been committed by the time this surfaces.
    #[error("judging deadline expired")]
    DeadlineExpired,

    /// Optimistic-concurrency loss on an atomic write. Internal only: the
    /// engine retries a bounded number of times and degrades to
    /// `InvalidState` before a caller ever sees it.
    #[error("store conflict")]
    StoreConflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) | AppError::DeadlineExpired => StatusCode::CONFLICT,
            AppError::InvalidChallenge(_) => StatusCode::BAD_REQUEST,
            AppError::StoreConflict | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
