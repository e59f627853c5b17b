//! In-process change feed. Log marks, unmarks, overdue reminders and new
//! notifications are published here and pushed to open sessions over
//! Server-Sent Events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::NaiveDate;
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adherence::detector::InMemoryAlertLedger;
use crate::auth::Actor;
use crate::models::log::MedicationLog;
use crate::models::notification::Notification;
use crate::session::SessionMonitor;
use crate::state::AppState;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    LogMarked {
        account_id: Uuid,
        log: MedicationLog,
    },
    LogUnmarked {
        account_id: Uuid,
        medication_id: Uuid,
        time_slot: String,
        log_date: NaiveDate,
    },
    NotificationCreated {
        account_id: Uuid,
        notification: Notification,
    },
    DoseOverdue {
        account_id: Uuid,
        medication_id: Uuid,
        medication_name: String,
        time_slot: String,
        deadline_minutes: u32,
    },
}

impl ChangeEvent {
    pub fn account_id(&self) -> Uuid {
        match self {
            ChangeEvent::LogMarked { account_id, .. }
            | ChangeEvent::LogUnmarked { account_id, .. }
            | ChangeEvent::NotificationCreated { account_id, .. }
            | ChangeEvent::DoseOverdue { account_id, .. } => *account_id,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ChangeEvent::LogMarked { .. } => "log_marked",
            ChangeEvent::LogUnmarked { .. } => "log_unmarked",
            ChangeEvent::NotificationCreated { .. } => "notification_created",
            ChangeEvent::DoseOverdue { .. } => "dose_overdue",
        }
    }
}

#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!("Published change event to {receivers} subscriber(s)");
    }

    /// Events for one account, in publish order. Subscribers that fall behind
    /// skip the overflowed events and keep going.
    pub fn subscribe(&self, account_id: Uuid) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        let rx = self.tx.subscribe();
        stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.account_id() == account_id => return Some((event, rx)),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event subscriber for {account_id} lagged, skipped {skipped} event(s)");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

/// GET /api/v1/events
///
/// Each open stream runs its own session monitor, so reminders and caretaker
/// escalation follow the lifetime of the connection.
pub async fn handle_events(
    State(state): State<AppState>,
    actor: Actor,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    use futures_util::StreamExt;

    let changes = state.events.subscribe(actor.account_id);
    let monitor = SessionMonitor::new(
        actor.account_id,
        state.status_source.clone(),
        state.dispatcher.clone(),
        Arc::new(InMemoryAlertLedger::new()),
        state.clock.clone(),
        state.events.clone(),
    );
    monitor.start(state.config.session_refresh());

    // The monitor lives inside the stream and stops when the client disconnects.
    let stream = changes.map(move |event| {
        let _session = &monitor;
        let sse = Event::default().event(event.name());
        Ok(sse.json_data(&event).unwrap_or_else(|e| {
            warn!("Failed to encode change event: {e}");
            Event::default().comment("encode error")
        }))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
