//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT issuance and verification, and the
//! user/role/permission lookup queries consumed by `merit_api`.

pub mod jwt;
pub mod password;
pub mod queries;

use thiserror::Error;

use crate::db::DbError;

/// Authentication errors.
///
/// The three token variants are kept distinct for logging and tests; the API
/// boundary collapses them into one generic 401 message so that callers
/// cannot probe which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Database call timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Timeout => AuthError::Timeout,
            DbError::Sql(e) => AuthError::DbError(e),
        }
    }
}
