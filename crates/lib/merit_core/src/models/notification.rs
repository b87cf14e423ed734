//! Notification domain model and the messages produced by achievement
//! transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::achievement::Achievement;
use crate::uuid::uuidv7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    fn new(
        recipient_id: Uuid,
        sender_id: Uuid,
        kind: &str,
        title: &str,
        message: String,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: uuidv7(),
            recipient_id,
            sender_id,
            kind: kind.to_string(),
            title: title.to_string(),
            message,
            data,
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    /// Notify an advisor that one of their students submitted an achievement.
    pub fn achievement_submitted(advisor_id: Uuid, achievement: &Achievement) -> Self {
        Self::new(
            advisor_id,
            achievement.owner_id,
            "achievement_submitted",
            "New Achievement Submission",
            format!(
                "A student has submitted an achievement '{}' for your verification",
                achievement.title
            ),
            serde_json::json!({
                "achievement_id": achievement.id,
                "student_id": achievement.owner_id,
                "action_type": "verify_achievement",
            }),
        )
    }

    /// Notify the owning student that their achievement was verified.
    pub fn achievement_verified(verifier_id: Uuid, achievement: &Achievement) -> Self {
        Self::new(
            achievement.owner_id,
            verifier_id,
            "achievement_verified",
            "Achievement Verified",
            format!(
                "Your achievement '{}' has been verified by your advisor",
                achievement.title
            ),
            serde_json::json!({
                "achievement_id": achievement.id,
                "advisor_id": verifier_id,
                "action_type": "view_achievement",
            }),
        )
    }

    /// Notify the owning student that their achievement was rejected,
    /// including the reason.
    pub fn achievement_rejected(rejecter_id: Uuid, achievement: &Achievement, reason: &str) -> Self {
        Self::new(
            achievement.owner_id,
            rejecter_id,
            "achievement_rejected",
            "Achievement Rejected",
            format!(
                "Your achievement '{}' has been rejected. Reason: {reason}",
                achievement.title
            ),
            serde_json::json!({
                "achievement_id": achievement.id,
                "advisor_id": rejecter_id,
                "reason": reason,
                "action_type": "edit_achievement",
            }),
        )
    }
}
