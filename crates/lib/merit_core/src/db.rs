//! Shared database call helpers.
//!
//! Every query in this crate runs under [`bounded`] so a stalled datastore
//! surfaces as [`DbError::Timeout`] instead of pinning the request that
//! issued it.

use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

/// Upper bound on a single datastore call.
pub const DB_TIMEOUT: Duration = Duration::from_secs(10);

/// A datastore call that failed or exceeded [`DB_TIMEOUT`].
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datastore call timed out")]
    Timeout,

    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Run a query future under [`DB_TIMEOUT`].
pub async fn bounded<T, F>(fut: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(DB_TIMEOUT, fut).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => Err(DbError::Timeout),
    }
}
