//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use merit_core::achievement::AchievementError;
use merit_core::auth::AuthError;

use crate::response::ApiResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// Token failures collapse to one generic 401 message so a caller cannot
/// probe which verification step failed. Datastore detail is logged
/// server-side and never echoed to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {limit} requests per {window_secs} seconds")]
    RateLimited { limit: usize, window_secs: u64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Permission gate misconfigured: no authenticated identity")]
    GateMisconfigured,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// The generic message returned for every token failure.
    pub fn invalid_token() -> Self {
        AppError::Unauthorized("Invalid or expired token".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            AppError::GateMisconfigured => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Internal(m) => {
                tracing::error!(error = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        ApiResponse::error(status, message).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Malformed | AuthError::InvalidSignature | AuthError::Expired => {
                AppError::invalid_token()
            }
            AuthError::CredentialError => {
                AppError::Unauthorized("Invalid username or password".into())
            }
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Timeout => AppError::Internal("database call timed out".into()),
            AuthError::Internal(m) => AppError::Internal(m),
        }
    }
}

impl From<AchievementError> for AppError {
    fn from(e: AchievementError) -> Self {
        match e {
            AchievementError::InvalidState { .. } => AppError::Validation(e.to_string()),
            AchievementError::Validation(m) => AppError::Validation(m),
            AchievementError::Denied(m) => AppError::Forbidden(m),
            AchievementError::NotFound => AppError::NotFound("Achievement not found".into()),
            AchievementError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<merit_core::achievement::store::StoreError> for AppError {
    fn from(e: merit_core::achievement::store::StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}
