use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::notification::Notification;
use crate::notifications::dispatcher::{DispatchOutcome, MissedDose};
use crate::notifications::store::{
    list_notifications, mark_all_read, mark_read, unread_count, DEFAULT_LIST_LIMIT,
};
use crate::state::AppState;

const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Deserialize)]
pub struct MissedDoseRequest {
    pub medication_name: String,
    pub time_slot: Option<String>,
    /// When the dose was found missing; defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
}

/// GET /api/v1/notifications
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    Ok(Json(
        list_notifications(&state.db, actor.account_id, limit).await?,
    ))
}

/// GET /api/v1/notifications/unread-count
pub async fn handle_unread_count(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = unread_count(&state.db, actor.account_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// POST /api/v1/notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(mark_read(&state.db, actor.account_id, id).await?))
}

/// POST /api/v1/notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = mark_all_read(&state.db, actor.account_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// POST /api/v1/notifications/missed
///
/// Callable used by a session that noticed an overdue dose. Goes through the
/// same dispatcher as the scheduled sweep, so a dose already reported today is
/// a no-op.
pub async fn handle_report_missed(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<MissedDoseRequest>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let dose = missed_dose(actor.account_id, req, state.clock.now())?;
    let outcome = state.dispatcher.dispatch(&dose).await?;
    Ok(Json(outcome))
}

fn missed_dose(
    account_id: Uuid,
    req: MissedDoseRequest,
    now: DateTime<FixedOffset>,
) -> Result<MissedDose, AppError> {
    let medication_name = req.medication_name.trim().to_string();
    if medication_name.is_empty() {
        return Err(AppError::Validation("medication_name is required".into()));
    }

    let occurred_at = req
        .timestamp
        .map(|ts| ts.with_timezone(now.offset()))
        .unwrap_or(now);

    Ok(MissedDose {
        account_id,
        medication_name,
        time_slot: req
            .time_slot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TimeSlot::from),
        day: occurred_at.date_naive(),
        occurred_at,
    })
}
