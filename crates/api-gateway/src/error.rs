//! HTTP error taxonomy.
//!
//! Auth and upstream failures answer with generic messages; the detail goes
//! to the log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use session_auth::AuthError;
use storage::StorageError;
use thiserror::Error;
use tracing::{debug, error};

/// Errors surfaced by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-supplied data failed validation.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Valid credentials without the required permission.
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// Anything the caller should not learn details about.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::SlugTaken => Self::Conflict("slug already in use"),
            StorageError::InvalidInput(msg) => Self::Validation(msg),
            StorageError::Sql(_) | StorageError::Corrupt(_) => {
                error!(error = %err, "storage failure");
                Self::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        debug!(error = %err, "session verification failed");
        Self::Unauthorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_status() {
        let cases = [
            (StorageError::NotFound("test"), StatusCode::NOT_FOUND),
            (StorageError::SlugTaken, StatusCode::CONFLICT),
            (
                StorageError::InvalidInput("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                StorageError::Corrupt("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_error_is_generic() {
        let err = ApiError::from(StorageError::Corrupt("secret detail".into()));
        assert_eq!(err.to_string(), "internal error");
    }

    #[test]
    fn auth_errors_are_unauthorized_and_generic() {
        let err = ApiError::from(AuthError::BadSignature);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "unauthorized");
    }
}
