use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::medications::MedicationInput;
use crate::models::medication::Medication;

pub async fn insert_medication(
    pool: &PgPool,
    account_id: Uuid,
    input: &MedicationInput,
) -> Result<Medication, AppError> {
    Ok(sqlx::query_as::<_, Medication>(
        r#"
        INSERT INTO medications
            (id, account_id, name, dosage, frequency, time_slots, food_timing, notes, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(account_id)
    .bind(&input.name)
    .bind(&input.dosage)
    .bind(&input.frequency)
    .bind(&input.time_slots)
    .bind(input.food_timing.as_str())
    .bind(input.notes.as_deref())
    .fetch_one(pool)
    .await?)
}

/// Active medications of one account, newest first.
pub async fn list_active(pool: &PgPool, account_id: Uuid) -> Result<Vec<Medication>, AppError> {
    Ok(sqlx::query_as::<_, Medication>(
        "SELECT * FROM medications WHERE account_id = $1 AND is_active ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?)
}

/// Every active medication with at least one declared slot, grouped by account.
pub async fn all_scheduled(pool: &PgPool) -> Result<Vec<Medication>, AppError> {
    Ok(sqlx::query_as::<_, Medication>(
        r#"
        SELECT * FROM medications
        WHERE is_active AND cardinality(time_slots) > 0
        ORDER BY account_id, created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?)
}

pub async fn get_medication(
    pool: &PgPool,
    account_id: Uuid,
    medication_id: Uuid,
) -> Result<Medication, AppError> {
    let medication: Option<Medication> =
        sqlx::query_as("SELECT * FROM medications WHERE id = $1 AND account_id = $2")
            .bind(medication_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await?;

    medication.ok_or_else(|| AppError::NotFound(format!("Medication {medication_id} not found")))
}

pub async fn update_medication(
    pool: &PgPool,
    account_id: Uuid,
    medication_id: Uuid,
    input: &MedicationInput,
) -> Result<Medication, AppError> {
    let updated: Option<Medication> = sqlx::query_as(
        r#"
        UPDATE medications
        SET name = $3, dosage = $4, frequency = $5, time_slots = $6,
            food_timing = $7, notes = $8, updated_at = now()
        WHERE id = $1 AND account_id = $2
        RETURNING *
        "#,
    )
    .bind(medication_id)
    .bind(account_id)
    .bind(&input.name)
    .bind(&input.dosage)
    .bind(&input.frequency)
    .bind(&input.time_slots)
    .bind(input.food_timing.as_str())
    .bind(input.notes.as_deref())
    .fetch_optional(pool)
    .await?;

    updated.ok_or_else(|| AppError::NotFound(format!("Medication {medication_id} not found")))
}

/// Soft delete. Logs and notifications keep referring to the row.
pub async fn deactivate_medication(
    pool: &PgPool,
    account_id: Uuid,
    medication_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE medications SET is_active = FALSE, updated_at = now() WHERE id = $1 AND account_id = $2",
    )
    .bind(medication_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Medication {medication_id} not found"
        )));
    }
    Ok(())
}
