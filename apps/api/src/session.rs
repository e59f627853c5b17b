#![allow(dead_code)]

//! Per-session reminder loop.
//!
//! While a session is open its monitor re-derives today's status on a fixed
//! interval, raises a reminder the first time a slot goes overdue and escalates
//! that slot to the caretaker through the dispatcher. The alert ledger is
//! cleared when the local day changes.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::StreamExt;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adherence::detector::{detect, first_alerts, AlertLedger, OverdueItem};
use crate::adherence::handlers::load_day_status;
use crate::adherence::slots::TimeSlot;
use crate::adherence::status::{merge_with_local, DailyStatusItem, DoseStatus};
use crate::clock::Clock;
use crate::errors::AppError;
use crate::events::{ChangeEvent, EventHub};
use crate::models::log::MedicationLog;
use crate::notifications::dispatcher::{Dispatcher, MissedDose};

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn day_status(
        &self,
        account_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<DailyStatusItem>, AppError>;
}

#[derive(Clone)]
pub struct PgStatusSource {
    pool: PgPool,
}

impl PgStatusSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusSource for PgStatusSource {
    async fn day_status(
        &self,
        account_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<DailyStatusItem>, AppError> {
        load_day_status(&self.pool, account_id, day).await
    }
}

#[derive(Debug, Default)]
struct SessionState {
    day: Option<NaiveDate>,
    items: Vec<DailyStatusItem>,
}

/// Result of one refresh.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub items: Vec<DailyStatusItem>,
    /// Slots that went overdue since the previous refresh.
    pub reminders: Vec<OverdueItem>,
    pub escalated: usize,
}

struct Inner {
    account_id: Uuid,
    source: Arc<dyn StatusSource>,
    dispatcher: Arc<Dispatcher>,
    ledger: Arc<dyn AlertLedger>,
    clock: Arc<dyn Clock>,
    events: EventHub,
    state: Mutex<SessionState>,
}

pub struct SessionMonitor {
    inner: Arc<Inner>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionMonitor {
    pub fn new(
        account_id: Uuid,
        source: Arc<dyn StatusSource>,
        dispatcher: Arc<Dispatcher>,
        ledger: Arc<dyn AlertLedger>,
        clock: Arc<dyn Clock>,
        events: EventHub,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                account_id,
                source,
                dispatcher,
                ledger,
                clock,
                events,
                state: Mutex::new(SessionState::default()),
            }),
            task: StdMutex::new(None),
        }
    }

    /// Starts the background loop. Calling it on a running monitor is a no-op.
    pub fn start(&self, every: Duration) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let changes = inner.events.subscribe(inner.account_id);
            tokio::pin!(changes);
            let mut ticker = tokio::time::interval(every);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = inner.refresh().await {
                            warn!("Session refresh for account {} failed: {e}", inner.account_id);
                        }
                    }
                    change = changes.next() => match change {
                        Some(event) => inner.apply(&event).await,
                        None => break,
                    },
                }
            }
        }));
        info!("Session monitor started for account {}", self.inner.account_id);
    }

    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            info!("Session monitor stopped for account {}", self.inner.account_id);
        }
    }

    pub fn is_running(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn refresh(&self) -> Result<Refresh, AppError> {
        self.inner.refresh().await
    }

    /// The session became visible again; re-derive immediately instead of
    /// waiting for the next tick.
    pub async fn on_visibility_regained(&self) -> Result<Refresh, AppError> {
        self.inner.refresh().await
    }

    pub async fn record_taken(&self, log: &MedicationLog) {
        self.inner.record_taken(log).await;
    }

    pub async fn record_unmark(&self, medication_id: Uuid, slot: &TimeSlot) {
        self.inner.forget_local(medication_id, slot).await;
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    async fn refresh(&self) -> Result<Refresh, AppError> {
        let today = self.clock.today();
        let now_minutes = self.clock.minutes_of_day();
        let fresh = self.source.day_status(self.account_id, today).await?;

        let items = {
            let mut state = self.state.lock().await;
            if state.day != Some(today) {
                if state.day.is_some() {
                    debug!("Local day changed to {today}; clearing alert ledger");
                }
                self.ledger.forget_before(today);
                state.items.clear();
                state.day = Some(today);
            }
            let merged = merge_with_local(&state.items, fresh);
            state.items = merged.clone();
            merged
        };

        let reminders = first_alerts(detect(&items, now_minutes), today, self.ledger.as_ref());
        let mut escalated = 0;
        for item in &reminders {
            self.events.publish(ChangeEvent::DoseOverdue {
                account_id: self.account_id,
                medication_id: item.medication.id,
                medication_name: item.medication.name.clone(),
                time_slot: item.time_slot.to_string(),
                deadline_minutes: item.deadline_minutes,
            });
            if self.escalate(item, today).await {
                escalated += 1;
            }
        }

        Ok(Refresh {
            items,
            reminders,
            escalated,
        })
    }

    async fn escalate(&self, item: &OverdueItem, today: NaiveDate) -> bool {
        let dose = MissedDose {
            account_id: self.account_id,
            medication_name: item.medication.name.clone(),
            time_slot: Some(item.time_slot.clone()),
            day: today,
            occurred_at: self.clock.now(),
        };
        match self.dispatcher.dispatch(&dose).await {
            Ok(outcome) => outcome.is_created(),
            Err(e) => {
                warn!(
                    "Escalation of {} ({}) for account {} failed: {e}",
                    dose.medication_name, item.time_slot, self.account_id
                );
                false
            }
        }
    }

    async fn apply(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::LogMarked { log, .. } => self.record_taken(log).await,
            ChangeEvent::LogUnmarked {
                medication_id,
                time_slot,
                log_date,
                ..
            } => {
                let current_day = self.state.lock().await.day;
                if current_day == Some(*log_date) {
                    self.forget_local(*medication_id, &TimeSlot::from(time_slot.as_str()))
                        .await;
                }
            }
            ChangeEvent::NotificationCreated { .. } | ChangeEvent::DoseOverdue { .. } => {}
        }
    }

    async fn record_taken(&self, log: &MedicationLog) {
        let mut state = self.state.lock().await;
        if state.day != Some(log.log_date) {
            return;
        }
        let slot = log.slot();
        for item in state
            .items
            .iter_mut()
            .filter(|i| i.medication.id == log.medication_id && i.time_slot == slot)
        {
            item.status = DoseStatus::from_log(log);
        }
    }

    /// Explicit revert of a locally confirmed dose.
    async fn forget_local(&self, medication_id: Uuid, slot: &TimeSlot) {
        let mut state = self.state.lock().await;
        for item in state
            .items
            .iter_mut()
            .filter(|i| i.medication.id == medication_id && &i.time_slot == slot)
        {
            item.status = DoseStatus::Pending;
        }
    }
}
