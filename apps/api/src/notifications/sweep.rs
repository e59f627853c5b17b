//! Scheduled missed-dose sweep. Runs on a fixed interval independent of any
//! open session; repeated runs inside a window rely on dispatcher idempotency.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::adherence::detector::{detect, OverdueItem};
use crate::adherence::slots::deadlines;
use crate::adherence::status::reconcile;
use crate::clock::Clock;
use crate::errors::AppError;
use crate::logs::store::taken_logs_for_day;
use crate::medications::store::all_scheduled;
use crate::models::log::MedicationLog;
use crate::models::medication::Medication;
use crate::notifications::dispatcher::{DispatchOutcome, Dispatcher, MissedDose};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub ran: bool,
    pub overdue: usize,
    pub created: usize,
    pub already_notified: usize,
    pub failed: usize,
}

/// True within `window_minutes` after one of the slot deadlines, inclusive.
pub fn should_sweep(now_minutes: u32, window_minutes: u32) -> bool {
    deadlines().any(|deadline| {
        now_minutes >= deadline && now_minutes - deadline <= window_minutes
    })
}

/// Overdue slots across every account. Medications stored without any slot are skipped.
pub fn sweep_candidates(
    medications: &[Medication],
    taken_today: &[MedicationLog],
    now_minutes: u32,
) -> Vec<OverdueItem> {
    let scheduled: Vec<Medication> = medications
        .iter()
        .filter(|m| m.is_active && !m.time_slots.is_empty())
        .cloned()
        .collect();
    detect(&reconcile(&scheduled, taken_today), now_minutes)
}

pub async fn dispatch_all(
    dispatcher: &Dispatcher,
    clock: &dyn Clock,
    overdue: Vec<OverdueItem>,
) -> SweepReport {
    let now = clock.now();
    let day = now.date_naive();
    let mut report = SweepReport {
        ran: true,
        overdue: overdue.len(),
        ..SweepReport::default()
    };

    for item in overdue {
        let dose = MissedDose {
            account_id: item.medication.account_id,
            medication_name: item.medication.name.clone(),
            time_slot: Some(item.time_slot.clone()),
            day,
            occurred_at: now,
        };
        match dispatcher.dispatch(&dose).await {
            Ok(DispatchOutcome::Created { .. }) => report.created += 1,
            Ok(DispatchOutcome::AlreadyNotified) => report.already_notified += 1,
            Err(e) => {
                error!(
                    "Failed to dispatch missed dose {} ({}) for account {}: {e}",
                    dose.medication_name, item.time_slot, dose.account_id
                );
                report.failed += 1;
            }
        }
    }
    report
}

pub async fn run_sweep(
    pool: &PgPool,
    dispatcher: &Dispatcher,
    clock: &dyn Clock,
    window_minutes: u32,
) -> Result<SweepReport, AppError> {
    let now_minutes = clock.minutes_of_day();
    if !should_sweep(now_minutes, window_minutes) {
        info!(
            "Skipping sweep - {:02}:{:02} is not within a check window",
            now_minutes / 60,
            now_minutes % 60
        );
        return Ok(SweepReport::default());
    }

    info!(
        "Checking for missed medications at {:02}:{:02}",
        now_minutes / 60,
        now_minutes % 60
    );
    let medications = all_scheduled(pool).await?;
    let logs = taken_logs_for_day(pool, clock.today()).await?;
    let overdue = sweep_candidates(&medications, &logs, now_minutes);

    let report = dispatch_all(dispatcher, clock, overdue).await;
    info!(
        "Sweep finished: {} overdue, {} notified, {} already notified, {} failed",
        report.overdue, report.created, report.already_notified, report.failed
    );
    Ok(report)
}

pub fn spawn_sweeper(
    pool: PgPool,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    every: Duration,
    window_minutes: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = run_sweep(&pool, &dispatcher, clock.as_ref(), window_minutes).await {
                error!("Missed-dose sweep failed: {e}");
            }
        }
    })
}
