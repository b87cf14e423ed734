//! Postgres-backed repository implementations.
//!
//! Every call runs under the shared datastore timeout so a stalled database
//! surfaces as [`StoreError::Timeout`] instead of hanging the request. The
//! transition queries fold the status precondition into the `WHERE` clause of
//! a single `UPDATE ... RETURNING`, so the check-and-write is atomic at the
//! row level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::db::bounded;
use crate::models::achievement::{
    Achievement, AchievementDocument, AchievementStatus, AchievementUpdate,
};

use super::store::{
    AchievementStore, ListFilter, Page, ReferenceProjection, SortField, SortOrder, StoreError,
    StudentDirectory, Transition,
};

const ACHIEVEMENT_COLUMNS: &str = "id, owner_id, title, description, category, points, status, \
     documents, submitted_at, verified_at, verified_by, rejected_at, rejection_reason, \
     is_deleted, deleted_at, deleted_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AchievementRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    category: String,
    points: i32,
    status: String,
    documents: Json<Vec<AchievementDocument>>,
    submitted_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    verified_by: Option<Uuid>,
    rejected_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AchievementRow> for Achievement {
    type Error = StoreError;

    fn try_from(row: AchievementRow) -> Result<Self, StoreError> {
        let status = AchievementStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown status '{}'", row.status)))?;
        Ok(Achievement {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            category: row.category,
            points: row.points,
            status,
            documents: row.documents.0,
            submitted_at: row.submitted_at,
            verified_at: row.verified_at,
            verified_by: row.verified_by,
            rejected_at: row.rejected_at,
            rejection_reason: row.rejection_reason,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgAchievementStore {
    pool: PgPool,
}

impl PgAchievementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementStore for PgAchievementStore {
    async fn create(&self, achievement: Achievement) -> Result<Achievement, StoreError> {
        bounded(
            sqlx::query(
                "INSERT INTO achievements \
                 (id, owner_id, title, description, category, points, status, documents, \
                  is_deleted, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $10)",
            )
            .bind(achievement.id)
            .bind(achievement.owner_id)
            .bind(&achievement.title)
            .bind(&achievement.description)
            .bind(&achievement.category)
            .bind(achievement.points)
            .bind(achievement.status.as_str())
            .bind(Json(&achievement.documents))
            .bind(achievement.created_at)
            .bind(achievement.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(achievement)
    }

    async fn find(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Achievement>, StoreError> {
        let sql = if include_deleted {
            format!("SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE id = $1")
        } else {
            format!("SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE id = $1 AND NOT is_deleted")
        };
        let row = bounded(
            sqlx::query_as::<_, AchievementRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(Achievement::try_from).transpose()
    }

    async fn update_draft(
        &self,
        id: Uuid,
        update: &AchievementUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Achievement>, StoreError> {
        let sql = format!(
            "UPDATE achievements SET \
               title = COALESCE($2, title), \
               description = COALESCE($3, description), \
               category = COALESCE($4, category), \
               points = COALESCE($5, points), \
               updated_at = $6 \
             WHERE id = $1 AND status = 'draft' AND NOT is_deleted \
             RETURNING {ACHIEVEMENT_COLUMNS}"
        );
        let row = bounded(
            sqlx::query_as::<_, AchievementRow>(&sql)
                .bind(id)
                .bind(update.title.as_deref())
                .bind(update.description.as_deref())
                .bind(update.category.as_deref())
                .bind(update.points)
                .bind(at)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(Achievement::try_from).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Achievement>, StoreError> {
        let required = transition.required_status();
        let row = match transition {
            Transition::Submit { at } => {
                let sql = format!(
                    "UPDATE achievements SET status = 'submitted', submitted_at = $2, \
                       updated_at = $2 \
                     WHERE id = $1 AND status = $3 AND NOT is_deleted \
                     RETURNING {ACHIEVEMENT_COLUMNS}"
                );
                bounded(
                    sqlx::query_as::<_, AchievementRow>(&sql)
                        .bind(id)
                        .bind(at)
                        .bind(required.as_str())
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            Transition::Verify { by, at } => {
                let sql = format!(
                    "UPDATE achievements SET status = 'verified', verified_by = $2, \
                       verified_at = $3, updated_at = $3 \
                     WHERE id = $1 AND status = $4 AND NOT is_deleted \
                     RETURNING {ACHIEVEMENT_COLUMNS}"
                );
                bounded(
                    sqlx::query_as::<_, AchievementRow>(&sql)
                        .bind(id)
                        .bind(by)
                        .bind(at)
                        .bind(required.as_str())
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            Transition::Reject { reason, at } => {
                let sql = format!(
                    "UPDATE achievements SET status = 'rejected', rejection_reason = $2, \
                       rejected_at = $3, updated_at = $3 \
                     WHERE id = $1 AND status = $4 AND NOT is_deleted \
                     RETURNING {ACHIEVEMENT_COLUMNS}"
                );
                bounded(
                    sqlx::query_as::<_, AchievementRow>(&sql)
                        .bind(id)
                        .bind(reason)
                        .bind(at)
                        .bind(required.as_str())
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            Transition::SoftDelete { by, at } => {
                let sql = format!(
                    "UPDATE achievements SET is_deleted = TRUE, deleted_by = $2, \
                       deleted_at = $3, updated_at = $3 \
                     WHERE id = $1 AND status = $4 AND NOT is_deleted \
                     RETURNING {ACHIEVEMENT_COLUMNS}"
                );
                bounded(
                    sqlx::query_as::<_, AchievementRow>(&sql)
                        .bind(id)
                        .bind(by)
                        .bind(at)
                        .bind(required.as_str())
                        .fetch_optional(&self.pool),
                )
                .await?
            }
        };
        row.map(Achievement::try_from).transpose()
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<Achievement>, StoreError> {
        fn push_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ListFilter) {
            qb.push(" WHERE NOT is_deleted");
            if let Some(owner_id) = filter.owner_id {
                qb.push(" AND owner_id = ").push_bind(owner_id);
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(category) = filter.category.clone() {
                qb.push(" AND category = ").push_bind(category);
            }
        }

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM achievements");
        push_filters(&mut count, filter);
        let (total,): (i64,) =
            bounded(count.build_query_as().fetch_one(&self.pool)).await?;

        let mut query =
            QueryBuilder::new(format!("SELECT {ACHIEVEMENT_COLUMNS} FROM achievements"));
        push_filters(&mut query, filter);
        query.push(match filter.sort_by {
            SortField::CreatedAt => " ORDER BY created_at",
            SortField::UpdatedAt => " ORDER BY updated_at",
            SortField::Points => " ORDER BY points",
        });
        query.push(match filter.sort_order {
            SortOrder::Asc => " ASC",
            SortOrder::Desc => " DESC",
        });
        query
            .push(" LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let rows: Vec<AchievementRow> =
            bounded(query.build_query_as().fetch_all(&self.pool)).await?;
        let items = rows
            .into_iter()
            .map(Achievement::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total: total as u64,
        })
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Achievement>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements \
             WHERE id = ANY($1) AND NOT is_deleted"
        );
        let rows = bounded(
            sqlx::query_as::<_, AchievementRow>(&sql)
                .bind(ids)
                .fetch_all(&self.pool),
        )
        .await?;
        rows.into_iter().map(Achievement::try_from).collect()
    }
}

/// Reference projection over the relational `achievement_refs` table.
#[derive(Debug, Clone)]
pub struct PgReferenceProjection {
    pool: PgPool,
}

impl PgReferenceProjection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceProjection for PgReferenceProjection {
    async fn create(
        &self,
        achievement_id: Uuid,
        owner_id: Uuid,
        status: AchievementStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        bounded(
            sqlx::query(
                "INSERT INTO achievement_refs \
                 (achievement_id, owner_id, status, is_deleted, created_at, updated_at) \
                 VALUES ($1, $2, $3, FALSE, $4, $4) \
                 ON CONFLICT (achievement_id) DO NOTHING",
            )
            .bind(achievement_id)
            .bind(owner_id)
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        achievement_id: Uuid,
        status: AchievementStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        bounded(
            sqlx::query(
                "UPDATE achievement_refs SET status = $2, updated_at = $3 \
                 WHERE achievement_id = $1",
            )
            .bind(achievement_id)
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn soft_delete(&self, achievement_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        bounded(
            sqlx::query(
                "UPDATE achievement_refs SET is_deleted = TRUE, updated_at = $2 \
                 WHERE achievement_id = $1",
            )
            .bind(achievement_id)
            .bind(at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn list_for_owners(
        &self,
        owner_ids: &[Uuid],
        page: u32,
        limit: u32,
    ) -> Result<Page<Uuid>, StoreError> {
        if owner_ids.is_empty() {
            return Ok(Page {
                items: Vec::new(),
                total: 0,
            });
        }
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows: Vec<(Uuid, i64)> = bounded(
            sqlx::query_as(
                "SELECT achievement_id, COUNT(*) OVER () FROM achievement_refs \
                 WHERE owner_id = ANY($1) AND NOT is_deleted \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(owner_ids)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool),
        )
        .await?;

        let total = rows.first().map(|(_, n)| *n as u64).unwrap_or(0);
        Ok(Page {
            items: rows.into_iter().map(|(id, _)| id).collect(),
            total,
        })
    }
}

/// Student/advisor relationships from the `students` table.
#[derive(Debug, Clone)]
pub struct PgStudentDirectory {
    pool: PgPool,
}

impl PgStudentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentDirectory for PgStudentDirectory {
    async fn advisor_of(&self, student_user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let row: Option<(Option<Uuid>,)> = bounded(
            sqlx::query_as("SELECT advisor_id FROM students WHERE user_id = $1")
                .bind(student_user_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.and_then(|(advisor,)| advisor))
    }

    async fn advisee_user_ids(&self, advisor_user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> = bounded(
            sqlx::query_as("SELECT user_id FROM students WHERE advisor_id = $1")
                .bind(advisor_user_id)
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
