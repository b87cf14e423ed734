//! User, role, and permission lookup queries.
//!
//! All three lookups run under the shared datastore timeout; a stalled
//! database answers the request with an error instead of holding it open.

use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::db::bounded;
use crate::models::auth::UserRecord;

/// Fetch a user (with role name) by username.
pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRecord>, AuthError> {
    let row = bounded(
        sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>, String)>(
            "SELECT u.id, u.username, u.full_name, u.password_hash, r.name \
             FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.username = $1 AND u.is_active",
        )
        .bind(username)
        .fetch_optional(pool),
    )
    .await?;
    Ok(row.map(|(id, username, full_name, password_hash, role)| UserRecord {
        id,
        username,
        full_name,
        password_hash,
        role,
    }))
}

/// Fetch a user (with role name) by ID.
pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>, AuthError> {
    let row = bounded(
        sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>, String)>(
            "SELECT u.id, u.username, u.full_name, u.password_hash, r.name \
             FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.id = $1 AND u.is_active",
        )
        .bind(user_id)
        .fetch_optional(pool),
    )
    .await?;
    Ok(row.map(|(id, username, full_name, password_hash, role)| UserRecord {
        id,
        username,
        full_name,
        password_hash,
        role,
    }))
}

/// Fetch the permission names granted to a user through its role.
pub async fn permissions_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, AuthError> {
    let rows = bounded(
        sqlx::query_scalar::<_, String>(
            "SELECT p.name \
             FROM users u \
             JOIN role_permissions rp ON rp.role_id = u.role_id \
             JOIN permissions p ON p.id = rp.permission_id \
             WHERE u.id = $1 \
             ORDER BY p.name",
        )
        .bind(user_id)
        .fetch_all(pool),
    )
    .await?;
    Ok(rows)
}
