//! Achievement request handlers.
//!
//! Role scoping and status preconditions live in the achievement service;
//! handlers only translate between HTTP and the service types.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use merit_core::achievement::store::{ListFilter, SortField, SortOrder};
use merit_core::models::achievement::{
    Achievement, AchievementStatus, AchievementUpdate, NewAchievement,
};
use merit_core::points::{CompetitionLevel, competition_level};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::response::ApiResponse;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            sort_by: None,
            sort_order: None,
            page: 1,
            limit: 10,
        }
    }
}

impl ListQuery {
    fn into_filter(self) -> Result<ListFilter, AppError> {
        let status = self
            .status
            .as_deref()
            .map(|s| {
                AchievementStatus::parse(s)
                    .ok_or_else(|| AppError::Validation(format!("Unknown status '{s}'")))
            })
            .transpose()?;
        let sort_by = match self.sort_by.as_deref() {
            None | Some("created_at") => SortField::CreatedAt,
            Some("updated_at") => SortField::UpdatedAt,
            Some("points") => SortField::Points,
            Some(other) => {
                return Err(AppError::Validation(format!("Unknown sort field '{other}'")));
            }
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(AppError::Validation(format!("Unknown sort order '{other}'")));
            }
        };
        Ok(ListFilter {
            owner_id: None,
            status,
            category: self.category,
            sort_by,
            sort_order,
            page: self.page,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// An achievement as serialized to clients, with its point total classified
/// into a competition level.
#[derive(Debug, Serialize)]
pub struct AchievementData {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub level: CompetitionLevel,
}

impl From<Achievement> for AchievementData {
    fn from(achievement: Achievement) -> Self {
        let level = competition_level(achievement.points);
        Self { achievement, level }
    }
}

#[derive(Debug, Serialize)]
pub struct PageData {
    pub items: Vec<AchievementData>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// `GET /api/v1/achievements` — paginated listing; students see only their
/// own records.
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<PageData>> {
    let (page, limit) = (query.page.max(1), query.limit.clamp(1, 100));
    let filter = query.into_filter()?;
    let result = state.achievements.list(user.actor(), filter).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievements",
        PageData {
            items: result.items.into_iter().map(Into::into).collect(),
            total: result.total,
            page,
            limit,
        },
    ))
}

/// `GET /api/v1/achievements/advisees` — achievements of the caller's
/// advisees.
pub async fn advisees_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<PageData>> {
    let (page, limit) = (query.page.max(1), query.limit.clamp(1, 100));
    let result = state
        .achievements
        .advisee_achievements(user.actor(), page, limit)
        .await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Advisee achievements",
        PageData {
            items: result.items.into_iter().map(Into::into).collect(),
            total: result.total,
            page,
            limit,
        },
    ))
}

/// `GET /api/v1/achievements/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<AchievementData>> {
    let achievement = state.achievements.get(user.actor(), id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievement",
        achievement.into(),
    ))
}

/// `POST /api/v1/achievements` — create a draft owned by the caller.
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<NewAchievement>,
) -> AppResult<ApiResponse<AchievementData>> {
    let created = state.achievements.create(user.actor(), body).await?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Achievement created",
        created.into(),
    ))
}

/// `PUT /api/v1/achievements/{id}` — update a draft's content fields.
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<AchievementUpdate>,
) -> AppResult<ApiResponse<AchievementData>> {
    let updated = state.achievements.update(user.actor(), id, body).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievement updated",
        updated.into(),
    ))
}

/// `DELETE /api/v1/achievements/{id}` — soft-delete a draft.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    state.achievements.soft_delete(user.actor(), id).await?;
    Ok(ApiResponse::message(
        StatusCode::OK,
        "Achievement deleted",
    ))
}

/// `POST /api/v1/achievements/{id}/submit`
pub async fn submit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<AchievementData>> {
    let submitted = state.achievements.submit(user.actor(), id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievement submitted",
        submitted.into(),
    ))
}

/// `POST /api/v1/achievements/{id}/verify`
pub async fn verify_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<AchievementData>> {
    let verified = state.achievements.verify(user.actor(), id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievement verified",
        verified.into(),
    ))
}

/// `POST /api/v1/achievements/{id}/reject` — requires a non-blank reason.
pub async fn reject_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> AppResult<ApiResponse<AchievementData>> {
    let rejected = state
        .achievements
        .reject(user.actor(), id, &body.reason)
        .await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Achievement rejected",
        rejected.into(),
    ))
}
