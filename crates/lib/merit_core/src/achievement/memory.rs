//! In-memory repository implementations.
//!
//! Used by tests and local runs without a datastore. The transition methods
//! hold the map lock across the precondition check and the update, matching
//! the atomic conditional-write discipline of the Postgres implementations.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::achievement::{Achievement, AchievementStatus, AchievementUpdate};
use crate::models::notification::Notification;
use crate::notifications::Notifier;

use super::store::{
    AchievementStore, ListFilter, Page, ReferenceProjection, SortField, SortOrder, StoreError,
    StudentDirectory, Transition,
};

#[derive(Debug, Default)]
pub struct MemoryAchievementStore {
    records: Mutex<HashMap<Uuid, Achievement>>,
}

impl MemoryAchievementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_transition(achievement: &mut Achievement, transition: &Transition) {
    match transition {
        Transition::Submit { at } => {
            achievement.status = AchievementStatus::Submitted;
            achievement.submitted_at = Some(*at);
            achievement.updated_at = *at;
        }
        Transition::Verify { by, at } => {
            achievement.status = AchievementStatus::Verified;
            achievement.verified_by = Some(*by);
            achievement.verified_at = Some(*at);
            achievement.updated_at = *at;
        }
        Transition::Reject { reason, at } => {
            achievement.status = AchievementStatus::Rejected;
            achievement.rejection_reason = Some(reason.clone());
            achievement.rejected_at = Some(*at);
            achievement.updated_at = *at;
        }
        Transition::SoftDelete { by, at } => {
            achievement.is_deleted = true;
            achievement.deleted_by = Some(*by);
            achievement.deleted_at = Some(*at);
            achievement.updated_at = *at;
        }
    }
}

#[async_trait]
impl AchievementStore for MemoryAchievementStore {
    async fn create(&self, achievement: Achievement) -> Result<Achievement, StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(achievement.id, achievement.clone());
        Ok(achievement)
    }

    async fn find(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Achievement>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(&id)
            .filter(|a| include_deleted || !a.is_deleted)
            .cloned())
    }

    async fn update_draft(
        &self,
        id: Uuid,
        update: &AchievementUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Achievement>, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(achievement) = records
            .get_mut(&id)
            .filter(|a| !a.is_deleted && a.status == AchievementStatus::Draft)
        else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            achievement.title = title.clone();
        }
        if let Some(description) = &update.description {
            achievement.description = description.clone();
        }
        if let Some(category) = &update.category {
            achievement.category = category.clone();
        }
        if let Some(points) = update.points {
            achievement.points = points;
        }
        achievement.updated_at = at;
        Ok(Some(achievement.clone()))
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> Result<Option<Achievement>, StoreError> {
        let required = transition.required_status();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(achievement) = records
            .get_mut(&id)
            .filter(|a| !a.is_deleted && a.status == required)
        else {
            return Ok(None);
        };
        apply_transition(achievement, transition);
        Ok(Some(achievement.clone()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<Achievement>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<Achievement> = records
            .values()
            .filter(|a| !a.is_deleted)
            .filter(|a| filter.owner_id.is_none_or(|owner| a.owner_id == owner))
            .filter(|a| filter.status.is_none_or(|status| a.status == status))
            .filter(|a| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|category| a.category == category)
            })
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let ordering = match filter.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Points => a.points.cmp(&b.points),
            };
            match filter.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Achievement>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|a| !a.is_deleted)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct RefRow {
    owner_id: Uuid,
    #[allow(dead_code)]
    status: AchievementStatus,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryReferenceProjection {
    rows: Mutex<HashMap<Uuid, RefRow>>,
}

impl MemoryReferenceProjection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReferenceProjection for MemoryReferenceProjection {
    async fn create(
        &self,
        achievement_id: Uuid,
        owner_id: Uuid,
        status: AchievementStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                achievement_id,
                RefRow {
                    owner_id,
                    status,
                    is_deleted: false,
                    created_at: at,
                },
            );
        Ok(())
    }

    async fn update_status(
        &self,
        achievement_id: Uuid,
        status: AchievementStatus,
        _at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(row) = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&achievement_id)
        {
            row.status = status;
        }
        Ok(())
    }

    async fn soft_delete(&self, achievement_id: Uuid, _at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(row) = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&achievement_id)
        {
            row.is_deleted = true;
        }
        Ok(())
    }

    async fn list_for_owners(
        &self,
        owner_ids: &[Uuid],
        page: u32,
        limit: u32,
    ) -> Result<Page<Uuid>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<(Uuid, DateTime<Utc>)> = rows
            .iter()
            .filter(|(_, row)| !row.is_deleted && owner_ids.contains(&row.owner_id))
            .map(|(id, row)| (*id, row.created_at))
            .collect();
        matched.sort_by(|a, b| b.1.cmp(&a.1));

        let total = matched.len() as u64;
        let offset = (page.saturating_sub(1) as usize) * limit as usize;
        let items = matched
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|(id, _)| id)
            .collect();
        Ok(Page { items, total })
    }
}

/// Notifier that retains sent notifications for inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, notification: Notification) -> Result<(), StoreError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

/// Static student → advisor map.
#[derive(Debug, Default)]
pub struct MemoryStudentDirectory {
    advisors: HashMap<Uuid, Uuid>,
}

impl MemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advisor(mut self, student_user_id: Uuid, advisor_user_id: Uuid) -> Self {
        self.advisors.insert(student_user_id, advisor_user_id);
        self
    }
}

#[async_trait]
impl StudentDirectory for MemoryStudentDirectory {
    async fn advisor_of(&self, student_user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.advisors.get(&student_user_id).copied())
    }

    async fn advisee_user_ids(&self, advisor_user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .advisors
            .iter()
            .filter(|(_, advisor)| **advisor == advisor_user_id)
            .map(|(student, _)| *student)
            .collect())
    }
}
