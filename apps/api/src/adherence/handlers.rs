use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adherence::calendar::{aggregate_month, DayStatus};
use crate::adherence::detector::{detect, OverdueItem};
use crate::adherence::stats::{compute_stats, month_bounds, stats_window, AdherenceStats};
use crate::adherence::status::{reconcile, DailyStatusItem};
use crate::auth::Actor;
use crate::errors::AppError;
use crate::logs::store::logs_in_range;
use crate::medications::store::list_active;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    /// 1-based.
    pub month: u32,
}

impl MonthQuery {
    fn bounds(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        month_bounds(self.year, self.month).ok_or_else(|| {
            AppError::Validation(format!("{}-{} is not a valid month", self.year, self.month))
        })
    }
}

#[derive(Debug, Serialize)]
pub struct TodayStatusResponse {
    pub date: NaiveDate,
    pub now_minutes: u32,
    pub items: Vec<DailyStatusItem>,
    pub overdue: Vec<OverdueItem>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<NaiveDate, DayStatus>,
}

/// Reconciled status of every active medication for one day.
pub async fn load_day_status(
    pool: &PgPool,
    account_id: Uuid,
    day: NaiveDate,
) -> Result<Vec<DailyStatusItem>, AppError> {
    let medications = list_active(pool, account_id).await?;
    let logs = logs_in_range(pool, account_id, day, day, None).await?;
    Ok(reconcile(&medications, &logs))
}

/// GET /api/v1/status/today
pub async fn handle_today_status(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<TodayStatusResponse>, AppError> {
    let date = state.clock.today();
    let now_minutes = state.clock.minutes_of_day();

    let items = load_day_status(&state.db, actor.account_id, date).await?;
    let overdue = detect(&items, now_minutes);

    Ok(Json(TodayStatusResponse {
        date,
        now_minutes,
        items,
        overdue,
    }))
}

/// GET /api/v1/stats?year=&month=
pub async fn handle_stats(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<MonthQuery>,
) -> Result<Json<AdherenceStats>, AppError> {
    let (start, end) = query.bounds()?;
    let today = state.clock.today();
    let (window_start, window_end) = stats_window(query.year, query.month, today)
        .ok_or_else(|| AppError::Validation("invalid month".into()))?;

    let medications = list_active(&state.db, actor.account_id).await?;
    let logs = logs_in_range(&state.db, actor.account_id, window_start, window_end, None).await?;

    Ok(Json(compute_stats(&medications, &logs, start, end, today)))
}

/// GET /api/v1/calendar?year=&month=
pub async fn handle_calendar(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<MonthQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let (start, end) = query.bounds()?;
    let today = state.clock.today();

    let medications = list_active(&state.db, actor.account_id).await?;
    let logs = logs_in_range(&state.db, actor.account_id, start, end, None).await?;

    Ok(Json(CalendarResponse {
        year: query.year,
        month: query.month,
        days: aggregate_month(&medications, &logs, query.year, query.month, today),
    }))
}
