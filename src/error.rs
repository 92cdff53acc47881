//! Error taxonomy shared by the stores and the HTTP gateway.
//!
//! Every variant maps to one HTTP status; handlers never leak raw storage
//! faults, they surface as `Internal` with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type Result<T, E = TodoError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Duplicate unique key (e.g. username already registered).
    #[error("{0}")]
    Conflict(String),

    /// Missing credential, or credentials that do not match an account.
    #[error("{0}")]
    Auth(String),

    /// Credential present but invalid or expired.
    #[error("{0}")]
    Forbidden(String),

    /// Resource absent or owned by another account.
    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TodoError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Duplicate usernames are reported as a bad request, not 409.
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for TodoError {
    fn from(e: rusqlite::Error) -> Self {
        TodoError::Internal(format!("database: {e}"))
    }
}

impl From<serde_json::Error> for TodoError {
    fn from(e: serde_json::Error) -> Self {
        TodoError::Internal(format!("serialization: {e}"))
    }
}

impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            TodoError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
