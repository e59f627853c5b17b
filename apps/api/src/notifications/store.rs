use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::notification::{NewNotification, Notification};

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Notification persistence as the dispatcher sees it.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// An existing notification for the same account, kind, medication, slot and day.
    async fn find_existing(&self, new: &NewNotification) -> Result<Option<Notification>, AppError>;

    /// Inserts the notification. `None` means an identical one already exists.
    async fn insert(&self, new: NewNotification) -> Result<Option<Notification>, AppError>;
}

#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn find_existing(&self, new: &NewNotification) -> Result<Option<Notification>, AppError> {
        Ok(sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE account_id = $1
              AND kind = $2
              AND medication_name = $3
              AND time_slot IS NOT DISTINCT FROM $4
              AND day_bucket = $5
            LIMIT 1
            "#,
        )
        .bind(new.account_id)
        .bind(new.kind)
        .bind(&new.medication_name)
        .bind(new.time_slot.as_deref())
        .bind(new.day_bucket)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert(&self, new: NewNotification) -> Result<Option<Notification>, AppError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        // Losing a race against another dispatcher lands on the unique index.
        let result = sqlx::query(
            r#"
            INSERT INTO notifications
                (id, account_id, kind, medication_name, time_slot, message, is_read, day_bucket, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(new.account_id)
        .bind(new.kind)
        .bind(&new.medication_name)
        .bind(new.time_slot.as_deref())
        .bind(&new.message)
        .bind(new.day_bucket)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(new.into_notification(id, created_at)))
    }
}

/// Newest first.
pub async fn list_notifications(
    pool: &PgPool,
    account_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, AppError> {
    Ok(sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn unread_count(pool: &PgPool, account_id: Uuid) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE account_id = $1 AND NOT is_read",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await?)
}

pub async fn mark_read(
    pool: &PgPool,
    account_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    let updated: Option<Notification> = sqlx::query_as(
        r#"
        UPDATE notifications
        SET is_read = TRUE, read_at = COALESCE(read_at, now())
        WHERE id = $1 AND account_id = $2
        RETURNING *
        "#,
    )
    .bind(notification_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    updated.ok_or_else(|| AppError::NotFound(format!("Notification {notification_id} not found")))
}

/// Returns how many notifications changed state.
pub async fn mark_all_read(pool: &PgPool, account_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, read_at = now() WHERE account_id = $1 AND NOT is_read",
    )
    .bind(account_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
