//! Notification request handlers.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use merit_core::models::notification::Notification;
use merit_core::notifications;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    pub limit: i64,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

/// `GET /api/v1/notifications` — the caller's notifications, newest first.
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<ApiResponse<Vec<Notification>>> {
    let limit = query.limit.clamp(1, 200);
    let items =
        notifications::list_for_recipient(&state.pool, user.claims.sub, limit).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Notifications", items))
}

/// `POST /api/v1/notifications/{id}/read` — mark one of the caller's
/// notifications as read.
pub async fn mark_read_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    let updated = notifications::mark_read(&state.pool, id, user.claims.sub).await?;
    if !updated {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    Ok(ApiResponse::message(StatusCode::OK, "Notification read"))
}
