//! Achievement state machine.
//!
//! States: `draft → submitted → {verified, rejected}`, with soft deletion
//! legal only from `draft`. The status preconditions are the sole concurrency
//! guard: the store applies the precondition check and the update atomically,
//! so a losing concurrent writer observes `InvalidState` instead of silently
//! overwriting.

pub mod memory;
pub mod pg;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::achievement::{
    Achievement, AchievementStatus, AchievementUpdate, NewAchievement,
};
use crate::models::auth::Role;
use crate::models::notification::Notification;
use crate::notifications::Notifier;
use crate::uuid::uuidv7;
use store::{
    AchievementStore, ListFilter, Page, ReferenceProjection, StoreError, StudentDirectory,
    Transition,
};

#[derive(Debug, Error)]
pub enum AchievementError {
    #[error("Achievement must be in '{required}' status (currently '{current}')")]
    InvalidState {
        current: AchievementStatus,
        required: AchievementStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    Denied(String),

    #[error("Achievement not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The authenticated caller of a state machine operation, as resolved by the
/// access gate.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub subject_id: Uuid,
    pub role: Role,
}

impl Actor {
    /// Students may only act on achievements they own; advisors and admins
    /// act across owners.
    fn can_act_on(&self, owner_id: Uuid) -> bool {
        self.role.is_privileged() || self.subject_id == owner_id
    }
}

/// Achievement lifecycle service over the repository contracts.
///
/// Projection updates and notifications are fire-and-forget: the document
/// store record is authoritative and a failed side effect is logged, never
/// rolled back against it.
pub struct AchievementService {
    store: Arc<dyn AchievementStore>,
    projection: Arc<dyn ReferenceProjection>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn StudentDirectory>,
}

impl AchievementService {
    pub fn new(
        store: Arc<dyn AchievementStore>,
        projection: Arc<dyn ReferenceProjection>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn StudentDirectory>,
    ) -> Self {
        Self {
            store,
            projection,
            notifier,
            directory,
        }
    }

    /// Create a new achievement in `draft`, owned by the actor.
    pub async fn create(
        &self,
        actor: Actor,
        new: NewAchievement,
    ) -> Result<Achievement, AchievementError> {
        if new.title.trim().is_empty() {
            return Err(AchievementError::Validation("Title is required".into()));
        }
        if new.points < 1 {
            return Err(AchievementError::Validation(
                "Points must be at least 1".into(),
            ));
        }

        let now = Utc::now();
        let achievement = Achievement {
            id: uuidv7(),
            owner_id: actor.subject_id,
            title: new.title,
            description: new.description,
            category: new.category,
            points: new.points,
            status: AchievementStatus::Draft,
            documents: Vec::new(),
            submitted_at: None,
            verified_at: None,
            verified_by: None,
            rejected_at: None,
            rejection_reason: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        let created = self.store.create(achievement).await?;

        if let Err(e) = self
            .projection
            .create(created.id, created.owner_id, created.status, now)
            .await
        {
            warn!(achievement_id = %created.id, error = %e, "failed to create reference projection");
        }
        info!(achievement_id = %created.id, owner = %created.owner_id, "achievement created");
        Ok(created)
    }

    /// Update a draft's content fields. Owner-or-privileged only.
    pub async fn update(
        &self,
        actor: Actor,
        id: Uuid,
        update: AchievementUpdate,
    ) -> Result<Achievement, AchievementError> {
        if let Some(points) = update.points
            && points < 1
        {
            return Err(AchievementError::Validation(
                "Points must be at least 1".into(),
            ));
        }
        if let Some(title) = &update.title
            && title.trim().is_empty()
        {
            return Err(AchievementError::Validation("Title must not be blank".into()));
        }

        let current = self.fetch_owned(actor, id).await?;
        match self.store.update_draft(id, &update, Utc::now()).await? {
            Some(updated) => Ok(updated),
            None => Err(AchievementError::InvalidState {
                current: self.live_status(id).await.unwrap_or(current.status),
                required: AchievementStatus::Draft,
            }),
        }
    }

    /// Submit a draft for verification and notify the owner's advisor.
    pub async fn submit(&self, actor: Actor, id: Uuid) -> Result<Achievement, AchievementError> {
        let transition = Transition::Submit { at: Utc::now() };
        let updated = self.apply_owned_transition(actor, id, transition).await?;

        self.sync_projection(&updated).await;
        match self.directory.advisor_of(updated.owner_id).await {
            Ok(Some(advisor_id)) => {
                self.dispatch(Notification::achievement_submitted(advisor_id, &updated))
                    .await;
            }
            Ok(None) => {
                warn!(owner = %updated.owner_id, "no advisor on record, skipping submission notification");
            }
            Err(e) => {
                warn!(owner = %updated.owner_id, error = %e, "advisor lookup failed, skipping submission notification");
            }
        }
        info!(achievement_id = %id, "achievement submitted");
        Ok(updated)
    }

    /// Verify a submitted achievement and notify the owning student.
    /// Verification is an advisor/admin act regardless of ownership.
    pub async fn verify(&self, actor: Actor, id: Uuid) -> Result<Achievement, AchievementError> {
        if !actor.role.is_privileged() {
            return Err(AchievementError::Denied(
                "Students cannot verify achievements".into(),
            ));
        }
        let transition = Transition::Verify {
            by: actor.subject_id,
            at: Utc::now(),
        };
        let updated = self.apply_transition(id, transition).await?;

        self.sync_projection(&updated).await;
        self.dispatch(Notification::achievement_verified(actor.subject_id, &updated))
            .await;
        info!(achievement_id = %id, verifier = %actor.subject_id, "achievement verified");
        Ok(updated)
    }

    /// Reject a submitted achievement with a mandatory reason and notify the
    /// owning student.
    pub async fn reject(
        &self,
        actor: Actor,
        id: Uuid,
        reason: &str,
    ) -> Result<Achievement, AchievementError> {
        if !actor.role.is_privileged() {
            return Err(AchievementError::Denied(
                "Students cannot reject achievements".into(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AchievementError::Validation(
                "Rejection reason is required".into(),
            ));
        }
        let transition = Transition::Reject {
            reason: reason.to_string(),
            at: Utc::now(),
        };
        let updated = self.apply_transition(id, transition).await?;

        self.sync_projection(&updated).await;
        self.dispatch(Notification::achievement_rejected(
            actor.subject_id,
            &updated,
            reason,
        ))
        .await;
        info!(achievement_id = %id, "achievement rejected");
        Ok(updated)
    }

    /// Soft-delete a draft. The record is hidden from default queries but
    /// never physically erased; the deletion is irreversible.
    pub async fn soft_delete(&self, actor: Actor, id: Uuid) -> Result<(), AchievementError> {
        let transition = Transition::SoftDelete {
            by: actor.subject_id,
            at: Utc::now(),
        };
        let updated = self.apply_owned_transition(actor, id, transition).await?;

        if let Err(e) = self.projection.soft_delete(updated.id, Utc::now()).await {
            warn!(achievement_id = %updated.id, error = %e, "failed to soft-delete reference projection");
        }
        info!(achievement_id = %id, "achievement soft-deleted");
        Ok(())
    }

    /// Fetch an active achievement, enforcing student ownership scoping.
    pub async fn get(&self, actor: Actor, id: Uuid) -> Result<Achievement, AchievementError> {
        self.fetch_owned(actor, id).await
    }

    /// Fetch a record through the explicit include-deleted path. Admin only.
    pub async fn get_any(&self, actor: Actor, id: Uuid) -> Result<Achievement, AchievementError> {
        if actor.role != Role::Admin {
            return Err(AchievementError::Denied(
                "Only admins may read deleted achievements".into(),
            ));
        }
        self.store
            .find(id, true)
            .await?
            .ok_or(AchievementError::NotFound)
    }

    /// Paginated listing. Students are always scoped to their own records;
    /// filters apply on top of the role scope.
    pub async fn list(
        &self,
        actor: Actor,
        mut filter: ListFilter,
    ) -> Result<Page<Achievement>, AchievementError> {
        if actor.role == Role::Student {
            filter.owner_id = Some(actor.subject_id);
        }
        filter.page = filter.page.max(1);
        filter.limit = filter.limit.clamp(1, 100);
        Ok(self.store.list(&filter).await?)
    }

    /// Achievements belonging to the actor's advisees, resolved through the
    /// relational projection and hydrated from the authoritative store.
    pub async fn advisee_achievements(
        &self,
        actor: Actor,
        page: u32,
        limit: u32,
    ) -> Result<Page<Achievement>, AchievementError> {
        if !actor.role.is_privileged() {
            return Err(AchievementError::Denied(
                "Only advisors may list advisee achievements".into(),
            ));
        }
        let advisees = self.directory.advisee_user_ids(actor.subject_id).await?;
        if advisees.is_empty() {
            return Ok(Page {
                items: Vec::new(),
                total: 0,
            });
        }
        let ids = self
            .projection
            .list_for_owners(&advisees, page.max(1), limit.clamp(1, 100))
            .await?;
        let items = self.store.find_by_ids(&ids.items).await?;
        Ok(Page {
            items,
            total: ids.total,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn fetch_owned(&self, actor: Actor, id: Uuid) -> Result<Achievement, AchievementError> {
        let achievement = self
            .store
            .find(id, false)
            .await?
            .ok_or(AchievementError::NotFound)?;
        if !actor.can_act_on(achievement.owner_id) {
            return Err(AchievementError::Denied(
                "Not your achievement".into(),
            ));
        }
        Ok(achievement)
    }

    /// Ownership-checked transition for owner-driven operations
    /// (submit, soft-delete).
    async fn apply_owned_transition(
        &self,
        actor: Actor,
        id: Uuid,
        transition: Transition,
    ) -> Result<Achievement, AchievementError> {
        // The ownership check reads first; the precondition itself is only
        // decided by the atomic conditional update below.
        self.fetch_owned(actor, id).await?;
        self.apply_transition(id, transition).await
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<Achievement, AchievementError> {
        let required = transition.required_status();
        match self.store.transition(id, &transition).await? {
            Some(updated) => Ok(updated),
            None => {
                // Precondition failed: either the record is gone or it holds
                // a different status (including a lost race).
                match self.live_status(id).await {
                    Some(current) => Err(AchievementError::InvalidState { current, required }),
                    None => Err(AchievementError::NotFound),
                }
            }
        }
    }

    async fn live_status(&self, id: Uuid) -> Option<AchievementStatus> {
        match self.store.find(id, false).await {
            Ok(found) => found.map(|a| a.status),
            Err(e) => {
                warn!(achievement_id = %id, error = %e, "status re-read failed");
                None
            }
        }
    }

    async fn sync_projection(&self, achievement: &Achievement) {
        if let Err(e) = self
            .projection
            .update_status(achievement.id, achievement.status, achievement.updated_at)
            .await
        {
            warn!(achievement_id = %achievement.id, error = %e, "failed to update reference projection");
        }
    }

    async fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.notifier.send(notification).await {
            warn!(error = %e, "failed to dispatch notification");
        }
    }
}
