//! Notification Dispatcher: turns a missed dose into at most one caretaker
//! notification per account, medication, slot and day, plus a best-effort email.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::AccountDirectory;
use crate::adherence::slots::TimeSlot;
use crate::db::bounded;
use crate::errors::AppError;
use crate::events::{ChangeEvent, EventHub};
use crate::models::notification::{NewNotification, Notification, KIND_MISSED_MEDICATION};
use crate::notifications::mailer::{slot_suffix, Mailer, MissedDoseEmail};
use crate::notifications::store::NotificationStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedDose {
    pub account_id: Uuid,
    pub medication_name: String,
    pub time_slot: Option<TimeSlot>,
    /// Local day the dose belonged to.
    pub day: NaiveDate,
    pub occurred_at: DateTime<FixedOffset>,
}

impl MissedDose {
    pub fn message(&self) -> String {
        format!(
            "Patient didn't take {}{}",
            self.medication_name,
            slot_suffix(self.slot_label())
        )
    }

    fn slot_label(&self) -> Option<&str> {
        self.time_slot.as_ref().map(TimeSlot::as_str)
    }

    fn to_new_notification(&self) -> NewNotification {
        NewNotification {
            account_id: self.account_id,
            kind: KIND_MISSED_MEDICATION,
            medication_name: self.medication_name.clone(),
            time_slot: self.slot_label().map(str::to_string),
            message: self.message(),
            day_bucket: self.day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Created {
        notification: Notification,
        email_sent: bool,
    },
    AlreadyNotified,
}

impl DispatchOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, DispatchOutcome::Created { .. })
    }
}

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(8000);
const DEFAULT_MAIL_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    mailer: Arc<dyn Mailer>,
    accounts: Arc<dyn AccountDirectory>,
    events: EventHub,
    store_timeout: Duration,
    mail_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn Mailer>,
        accounts: Arc<dyn AccountDirectory>,
        events: EventHub,
    ) -> Self {
        Self {
            store,
            mailer,
            accounts,
            events,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            mail_timeout: DEFAULT_MAIL_TIMEOUT,
        }
    }

    /// Store calls are bounded by `store`, each mail send separately by `mail`.
    pub fn with_timeouts(mut self, store: Duration, mail: Duration) -> Self {
        self.store_timeout = store;
        self.mail_timeout = mail;
        self
    }

    /// Records the missed dose unless it was already notified today.
    ///
    /// Email and the stored notification are independent: a mail failure is
    /// logged and the notification is still written.
    pub async fn dispatch(&self, dose: &MissedDose) -> Result<DispatchOutcome, AppError> {
        let new = dose.to_new_notification();

        let existing = bounded(
            self.store_timeout,
            "look up notification",
            self.store.find_existing(&new),
        )
        .await?;
        if existing.is_some() {
            info!(
                "Notification already sent for {}{} today",
                dose.medication_name,
                slot_suffix(dose.slot_label())
            );
            return Ok(DispatchOutcome::AlreadyNotified);
        }

        let email_sent = self.send_email(dose).await;

        let inserted = bounded(
            self.store_timeout,
            "record notification",
            self.store.insert(new),
        )
        .await?;
        let Some(notification) = inserted else {
            return Ok(DispatchOutcome::AlreadyNotified);
        };

        info!(
            "Notification {} recorded for account {}: {}",
            notification.id, notification.account_id, notification.message
        );
        self.events.publish(ChangeEvent::NotificationCreated {
            account_id: notification.account_id,
            notification: notification.clone(),
        });

        Ok(DispatchOutcome::Created {
            notification,
            email_sent,
        })
    }

    async fn send_email(&self, dose: &MissedDose) -> bool {
        let lookup = bounded(
            self.store_timeout,
            "look up contact email",
            self.accounts.contact_email(dose.account_id),
        );
        let recipient = match lookup.await {
            Ok(Some(email)) => email,
            Ok(None) => {
                warn!("Account {} has no contact email; skipping email", dose.account_id);
                return false;
            }
            Err(e) => {
                warn!("Contact lookup for account {} failed: {e}", dose.account_id);
                return false;
            }
        };

        let occurred_at = dose.occurred_at.format("%Y-%m-%d %H:%M").to_string();
        let email = MissedDoseEmail {
            medication_name: &dose.medication_name,
            slot_label: dose.slot_label(),
            occurred_at: &occurred_at,
        }
        .to(&recipient);

        match tokio::time::timeout(self.mail_timeout, self.mailer.send(&email)).await {
            Ok(Ok(())) => {
                info!("Email sent for {}", email.subject);
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to send missed-dose email to {recipient}: {e}");
                false
            }
            Err(_) => {
                warn!(
                    "Missed-dose email to {recipient} gave up after {}ms",
                    self.mail_timeout.as_millis()
                );
                false
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::notifications::mailer::testing::RecordingMailer;
    use crate::notifications::store::testing::InMemoryNotificationStore;

    #[derive(Default)]
    pub struct StaticDirectory(pub HashMap<Uuid, String>);

    #[async_trait]
    impl AccountDirectory for StaticDirectory {
        async fn contact_email(&self, account_id: Uuid) -> Result<Option<String>, AppError> {
            Ok(self.0.get(&account_id).cloned())
        }
    }

    pub struct Harness {
        pub dispatcher: Arc<Dispatcher>,
        pub store: Arc<InMemoryNotificationStore>,
        pub mailer: Arc<RecordingMailer>,
        pub events: EventHub,
    }

    pub fn harness(account_id: Uuid, mailer: RecordingMailer) -> Harness {
        let store = Arc::new(InMemoryNotificationStore::default());
        let mailer = Arc::new(mailer);
        let events = EventHub::new(16);
        let directory = StaticDirectory(HashMap::from([(
            account_id,
            "carer@example.com".to_string(),
        )]));
        Harness {
            dispatcher: Arc::new(Dispatcher::new(
                store.clone(),
                mailer.clone(),
                Arc::new(directory),
                events.clone(),
            )),
            store,
            mailer,
            events,
        }
    }
}
