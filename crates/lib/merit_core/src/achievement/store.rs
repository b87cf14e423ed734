//! Repository contracts consumed by the achievement state machine.
//!
//! Narrow interfaces over the external datastores. The achievement store is
//! authoritative; the reference projection is an eventually consistent copy
//! kept in the relational store for cross-entity reporting joins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DbError;
use crate::models::achievement::{Achievement, AchievementStatus, AchievementUpdate};

/// Datastore-level failures. Full detail is logged server-side; callers see a
/// generic 500-class error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Datastore call timed out")]
    Timeout,

    #[error("Datastore error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Timeout => StoreError::Timeout,
            DbError::Sql(e) => StoreError::Backend(e.to_string()),
        }
    }
}

/// A status transition together with the stamps it writes.
///
/// Each variant carries an implied precondition on the current status; the
/// store must check the precondition and apply the update atomically so that
/// two concurrent writers cannot both observe a satisfied precondition.
#[derive(Debug, Clone)]
pub enum Transition {
    Submit { at: DateTime<Utc> },
    Verify { by: Uuid, at: DateTime<Utc> },
    Reject { reason: String, at: DateTime<Utc> },
    SoftDelete { by: Uuid, at: DateTime<Utc> },
}

impl Transition {
    /// The status the record must currently hold for this transition.
    pub fn required_status(&self) -> AchievementStatus {
        match self {
            Transition::Submit { .. } | Transition::SoftDelete { .. } => AchievementStatus::Draft,
            Transition::Verify { .. } | Transition::Reject { .. } => AchievementStatus::Submitted,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Points,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter, sort, and pagination for achievement listings.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<AchievementStatus>,
    pub category: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            status: None,
            category: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: 10,
        }
    }
}

impl ListFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// A page of results with the unpaginated total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Authoritative achievement store.
#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn create(&self, achievement: Achievement) -> Result<Achievement, StoreError>;

    /// Fetch by ID. With `include_deleted = false`, soft-deleted records are
    /// treated as absent.
    async fn find(&self, id: Uuid, include_deleted: bool)
    -> Result<Option<Achievement>, StoreError>;

    /// Apply a partial update iff the record is an active draft. Returns
    /// `None` when the record is absent, deleted, or no longer a draft.
    async fn update_draft(
        &self,
        id: Uuid,
        update: &AchievementUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Achievement>, StoreError>;

    /// Atomically check the transition's precondition and apply it. Returns
    /// `None` when the precondition does not hold (absent, deleted, or wrong
    /// status) — a losing concurrent writer lands here.
    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Achievement>, StoreError>;

    /// Paginated listing of active records.
    async fn list(&self, filter: &ListFilter) -> Result<Page<Achievement>, StoreError>;

    /// Fetch a set of active records by ID, preserving no particular order.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Achievement>, StoreError>;
}

/// Denormalized achievement summary mirrored into the relational store.
/// Best-effort: update failures are logged by the caller, never propagated.
#[async_trait]
pub trait ReferenceProjection: Send + Sync {
    async fn create(
        &self,
        achievement_id: Uuid,
        owner_id: Uuid,
        status: AchievementStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        achievement_id: Uuid,
        status: AchievementStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn soft_delete(&self, achievement_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Achievement IDs owned by any of `owner_ids`, newest first, with the
    /// unpaginated total. Read path for advisor views and reporting joins.
    async fn list_for_owners(
        &self,
        owner_ids: &[Uuid],
        page: u32,
        limit: u32,
    ) -> Result<Page<Uuid>, StoreError>;
}

/// Student/advisor relationship lookup.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Advisor user ID for a student user, if one is on record.
    async fn advisor_of(&self, student_user_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// User IDs of the students advised by the given advisor.
    async fn advisee_user_ids(&self, advisor_user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}
