use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const KIND_MISSED_MEDICATION: &str = "missed_medication";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    /// Denormalized so the notification survives renames and soft deletes.
    pub medication_name: String,
    pub time_slot: Option<String>,
    pub message: String,
    pub is_read: bool,
    /// Local day the notification belongs to; part of the idempotency key.
    pub day_bucket: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Fields the dispatcher supplies when recording a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub account_id: Uuid,
    pub kind: &'static str,
    pub medication_name: String,
    pub time_slot: Option<String>,
    pub message: String,
    pub day_bucket: NaiveDate,
}

impl NewNotification {
    pub fn into_notification(self, id: Uuid, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            account_id: self.account_id,
            kind: self.kind.to_string(),
            medication_name: self.medication_name,
            time_slot: self.time_slot,
            message: self.message,
            is_read: false,
            day_bucket: self.day_bucket,
            created_at,
            read_at: None,
        }
    }
}
