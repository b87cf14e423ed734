//! Notification dispatch and queries.
//!
//! Dispatch is a best-effort side effect of achievement transitions: a failed
//! send is logged by the caller and never rolls the transition back.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::achievement::store::StoreError;
use crate::db::bounded;
use crate::models::notification::Notification;

/// Sink for notifications produced by achievement transitions.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), StoreError>;
}

/// Notifier backed by the `notifications` table.
#[derive(Debug, Clone)]
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn send(&self, notification: Notification) -> Result<(), StoreError> {
        bounded(
            sqlx::query(
                "INSERT INTO notifications \
                 (id, recipient_id, sender_id, kind, title, message, data, is_read, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)",
            )
            .bind(notification.id)
            .bind(notification.recipient_id)
            .bind(notification.sender_id)
            .bind(&notification.kind)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.data)
            .bind(notification.created_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

/// Fetch the newest notifications for a recipient.
pub async fn list_for_recipient(
    pool: &PgPool,
    recipient_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, StoreError> {
    let query = sqlx::query_as::<
        _,
        (
            Uuid,
            Uuid,
            Uuid,
            String,
            String,
            String,
            serde_json::Value,
            bool,
            chrono::DateTime<Utc>,
            Option<chrono::DateTime<Utc>>,
        ),
    >(
        "SELECT id, recipient_id, sender_id, kind, title, message, data, is_read, created_at, read_at \
         FROM notifications WHERE recipient_id = $1 \
         ORDER BY created_at DESC LIMIT $2",
    )
    .bind(recipient_id)
    .bind(limit);
    let rows = bounded(query.fetch_all(pool)).await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, recipient_id, sender_id, kind, title, message, data, is_read, created_at, read_at)| {
                Notification {
                    id,
                    recipient_id,
                    sender_id,
                    kind,
                    title,
                    message,
                    data,
                    is_read,
                    created_at,
                    read_at,
                }
            },
        )
        .collect())
}

/// Mark a notification as read. Scoped to the recipient so one user cannot
/// acknowledge another's notifications. Returns whether a row was updated.
pub async fn mark_read(
    pool: &PgPool,
    notification_id: Uuid,
    recipient_id: Uuid,
) -> Result<bool, StoreError> {
    let result = bounded(
        sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = now() \
             WHERE id = $1 AND recipient_id = $2 AND NOT is_read",
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(pool),
    )
    .await?;
    Ok(result.rows_affected() > 0)
}
