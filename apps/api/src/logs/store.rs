use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::errors::AppError;
use crate::models::log::{MarkedBy, MedicationLog, STATUS_TAKEN};

pub struct MarkTaken<'a> {
    pub account_id: Uuid,
    pub medication_id: Uuid,
    pub log_date: NaiveDate,
    pub time_slot: &'a TimeSlot,
    pub marked_by: MarkedBy,
    pub proof_photo_url: Option<&'a str>,
}

/// Creates or overwrites the log for one slot. Concurrent calls converge on one row.
pub async fn upsert_taken(pool: &PgPool, mark: MarkTaken<'_>) -> Result<MedicationLog, AppError> {
    Ok(sqlx::query_as::<_, MedicationLog>(
        r#"
        INSERT INTO medication_logs
            (id, account_id, medication_id, log_date, time_slot, status, taken_at, marked_by, proof_photo_url)
        VALUES ($1, $2, $3, $4, $5, $6, now(), $7, $8)
        ON CONFLICT ON CONSTRAINT medication_logs_slot_key DO UPDATE
            SET status = EXCLUDED.status,
                taken_at = EXCLUDED.taken_at,
                marked_by = EXCLUDED.marked_by,
                proof_photo_url = EXCLUDED.proof_photo_url,
                updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(mark.account_id)
    .bind(mark.medication_id)
    .bind(mark.log_date)
    .bind(mark.time_slot.as_str())
    .bind(STATUS_TAKEN)
    .bind(mark.marked_by.as_str())
    .bind(mark.proof_photo_url)
    .fetch_one(pool)
    .await?)
}

/// Removes the log for one slot, returning it.
pub async fn delete_log(
    pool: &PgPool,
    account_id: Uuid,
    medication_id: Uuid,
    log_date: NaiveDate,
    time_slot: &TimeSlot,
) -> Result<MedicationLog, AppError> {
    let deleted: Option<MedicationLog> = sqlx::query_as(
        r#"
        DELETE FROM medication_logs
        WHERE account_id = $1 AND medication_id = $2 AND log_date = $3 AND time_slot = $4
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(medication_id)
    .bind(log_date)
    .bind(time_slot.as_str())
    .fetch_optional(pool)
    .await?;

    deleted.ok_or_else(|| AppError::NotFound("No medication log found to unmark".into()))
}

/// Logs with `start <= log_date <= end`, newest day first.
pub async fn logs_in_range(
    pool: &PgPool,
    account_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    limit: Option<i64>,
) -> Result<Vec<MedicationLog>, AppError> {
    Ok(sqlx::query_as::<_, MedicationLog>(
        r#"
        SELECT * FROM medication_logs
        WHERE account_id = $1 AND log_date BETWEEN $2 AND $3
        ORDER BY log_date DESC, created_at DESC
        LIMIT $4
        "#,
    )
    .bind(account_id)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Taken logs of every account for one day.
pub async fn taken_logs_for_day(pool: &PgPool, day: NaiveDate) -> Result<Vec<MedicationLog>, AppError> {
    Ok(sqlx::query_as::<_, MedicationLog>(
        "SELECT * FROM medication_logs WHERE log_date = $1 AND status = $2",
    )
    .bind(day)
    .bind(STATUS_TAKEN)
    .fetch_all(pool)
    .await?)
}
