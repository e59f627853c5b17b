use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::auth::Actor;
use crate::db::bounded;
use crate::errors::AppError;
use crate::events::ChangeEvent;
use crate::logs::proof::{store_proof_photo, ProofPhoto};
use crate::logs::store::{delete_log, logs_in_range, upsert_taken, MarkTaken};
use crate::medications::store::get_medication;
use crate::models::log::MedicationLog;
use crate::state::AppState;

const MAX_LOG_QUERY_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct MarkTakenRequest {
    pub medication_id: Uuid,
    pub time_slot: String,
    /// Inline `data:` URL of a photo taken at intake.
    pub proof_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnmarkRequest {
    pub medication_id: Uuid,
    pub time_slot: String,
}

#[derive(Debug, Deserialize)]
pub struct LogRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub limit: Option<i64>,
}

fn parse_slot(raw: &str) -> Result<TimeSlot, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::Validation("time_slot is required".into()));
    }
    Ok(TimeSlot::from(raw))
}

/// POST /api/v1/logs/mark
pub async fn handle_mark_taken(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<MarkTakenRequest>,
) -> Result<Json<MedicationLog>, AppError> {
    let slot = parse_slot(&req.time_slot)?;
    let timeout = state.config.store_timeout();
    let now = state.clock.now();
    let today = now.date_naive();

    let medication = bounded(
        timeout,
        "load medication",
        get_medication(&state.db, actor.account_id, req.medication_id),
    )
    .await?;
    if !medication.is_active {
        return Err(AppError::Validation(format!(
            "{} is no longer active",
            medication.name
        )));
    }
    if !medication.declares(&slot) {
        return Err(AppError::Validation(format!(
            "{} is not scheduled for {slot}",
            medication.name
        )));
    }

    let proof_photo_url = match req.proof_photo.as_deref().filter(|p| !p.is_empty()) {
        None => None,
        Some(data_url) => {
            let photo = ProofPhoto::from_data_url(
                data_url,
                actor.account_id,
                medication.id,
                &slot,
                now.timestamp_millis(),
            )
            .map_err(|e| AppError::Validation(e.to_string()))?;
            Some(
                store_proof_photo(
                    &state.s3,
                    &state.config.s3_bucket,
                    &state.config.s3_endpoint,
                    photo,
                    data_url,
                    timeout,
                )
                .await,
            )
        }
    };

    let log = bounded(
        timeout,
        "mark taken",
        upsert_taken(
            &state.db,
            MarkTaken {
                account_id: actor.account_id,
                medication_id: medication.id,
                log_date: today,
                time_slot: &slot,
                marked_by: actor.role.marked_by(),
                proof_photo_url: proof_photo_url.as_deref(),
            },
        ),
    )
    .await?;

    info!(
        "{} ({slot}) marked taken by {} for account {}",
        medication.name,
        log.marker(),
        actor.account_id
    );
    state.events.publish(ChangeEvent::LogMarked {
        account_id: actor.account_id,
        log: log.clone(),
    });

    Ok(Json(log))
}

/// POST /api/v1/logs/unmark
pub async fn handle_unmark(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UnmarkRequest>,
) -> Result<Json<MedicationLog>, AppError> {
    let slot = parse_slot(&req.time_slot)?;
    let today = state.clock.today();

    let removed = bounded(
        state.config.store_timeout(),
        "unmark",
        delete_log(&state.db, actor.account_id, req.medication_id, today, &slot),
    )
    .await?;

    info!(
        "Log {} for medication {} ({slot}) removed for account {}",
        removed.id, req.medication_id, actor.account_id
    );
    state.events.publish(ChangeEvent::LogUnmarked {
        account_id: actor.account_id,
        medication_id: removed.medication_id,
        time_slot: removed.time_slot.clone(),
        log_date: removed.log_date,
    });

    Ok(Json(removed))
}

/// GET /api/v1/logs?start=&end=&limit=
pub async fn handle_list_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<LogRangeQuery>,
) -> Result<Json<Vec<MedicationLog>>, AppError> {
    validate_range(&query)?;
    let logs = logs_in_range(
        &state.db,
        actor.account_id,
        query.start,
        query.end,
        query.limit,
    )
    .await?;
    Ok(Json(logs))
}

fn validate_range(query: &LogRangeQuery) -> Result<(), AppError> {
    if query.start > query.end {
        return Err(AppError::Validation("start must not be after end".into()));
    }
    if let Some(limit) = query.limit {
        if !(1..=MAX_LOG_QUERY_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LOG_QUERY_LIMIT}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: u32, end: u32, limit: Option<i64>) -> LogRangeQuery {
        LogRangeQuery {
            start: NaiveDate::from_ymd_opt(2026, 3, start).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, end).unwrap(),
            limit,
        }
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(&query(1, 31, None)).is_ok());
        assert!(validate_range(&query(5, 5, Some(10))).is_ok());
        assert!(validate_range(&query(6, 5, None)).is_err());
        assert!(validate_range(&query(1, 5, Some(0))).is_err());
        assert!(validate_range(&query(1, 5, Some(5000))).is_err());
    }

    #[test]
    fn test_parse_slot() {
        assert_eq!(parse_slot("evening").unwrap(), TimeSlot::Evening);
        assert!(matches!(parse_slot("  "), Err(AppError::Validation(_))));
    }
}
