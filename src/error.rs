/// Unified error types for the YAMO finance core
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the finance core
#[derive(Error, Debug)]
pub enum YamoError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No credential presented at all
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// A credential was presented but is malformed, expired, or stale
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Valid credential, insufficient role for the requested action
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Team/book selection failed; caller state rolls back to last known-good
    #[error("Context transition failed: {0}")]
    Transition(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g. duplicate membership)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert YamoError to HTTP response
impl IntoResponse for YamoError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            YamoError::Unauthenticated(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            YamoError::InvalidCredential(_) => (
                StatusCode::FORBIDDEN,
                "InvalidCredential",
                self.to_string(),
            ),
            YamoError::Unauthorized(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
            ),
            YamoError::Transition(_) => (
                StatusCode::CONFLICT,
                "TransitionFailed",
                self.to_string(),
            ),
            YamoError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            YamoError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            YamoError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            YamoError::Database(_) | YamoError::Internal(_) | YamoError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for finance core operations
pub type YamoResult<T> = Result<T, YamoError>;
