//! Achievement domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an achievement.
///
/// Transitions: `Draft → Submitted → {Verified, Rejected}`. Soft deletion is
/// only legal from `Draft` and is tracked separately via `is_deleted` so the
/// record stays queryable through the include-deleted path. There is no
/// transition out of `Verified` or `Rejected`; a rejected achievement cannot
/// be resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementStatus::Draft => "draft",
            AchievementStatus::Submitted => "submitted",
            AchievementStatus::Verified => "verified",
            AchievementStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<AchievementStatus> {
        match s {
            "draft" => Some(AchievementStatus::Draft),
            "submitted" => Some(AchievementStatus::Submitted),
            "verified" => Some(AchievementStatus::Verified),
            "rejected" => Some(AchievementStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supporting document attached to an achievement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDocument {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// An achievement record. The document-store row is authoritative; the
/// relational reference projection may lag behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: i32,
    pub status: AchievementStatus,
    pub documents: Vec<AchievementDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an achievement.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAchievement {
    pub title: String,
    pub description: String,
    pub category: String,
    pub points: i32,
}

/// Partial update applied to a draft achievement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AchievementUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub points: Option<i32>,
}
