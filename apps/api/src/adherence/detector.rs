//! Reminder / missed-dose detection.
//!
//! `detect` is stateless. Repeat suppression belongs to the caller, which keeps an
//! [`AlertLedger`] keyed by medication, slot and day.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::adherence::status::DailyStatusItem;
use crate::models::medication::Medication;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueItem {
    pub medication: Medication,
    pub time_slot: TimeSlot,
    pub deadline_minutes: u32,
}

/// Pending slots whose deadline has passed at `now_minutes` (minutes since local midnight).
pub fn detect(items: &[DailyStatusItem], now_minutes: u32) -> Vec<OverdueItem> {
    items
        .iter()
        .filter(|item| item.status.is_pending())
        .filter_map(|item| {
            let deadline = item.time_slot.deadline_minutes()?;
            (now_minutes >= deadline).then(|| OverdueItem {
                medication: item.medication.clone(),
                time_slot: item.time_slot.clone(),
                deadline_minutes: deadline,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub medication_id: Uuid,
    pub time_slot: TimeSlot,
    pub date: NaiveDate,
}

impl AlertKey {
    pub fn for_item(item: &OverdueItem, date: NaiveDate) -> Self {
        Self {
            medication_id: item.medication.id,
            time_slot: item.time_slot.clone(),
            date,
        }
    }
}

/// Remembers which overdue slots have already been alerted.
pub trait AlertLedger: Send + Sync {
    /// Records the key. Returns `true` only the first time a key is seen.
    fn record(&self, key: AlertKey) -> bool;

    /// Drops every key dated before `date`.
    fn forget_before(&self, date: NaiveDate);
}

#[derive(Debug, Default)]
pub struct InMemoryAlertLedger {
    seen: Mutex<HashSet<AlertKey>>,
}

impl InMemoryAlertLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertLedger for InMemoryAlertLedger {
    fn record(&self, key: AlertKey) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(key)
    }

    fn forget_before(&self, date: NaiveDate) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.retain(|key| key.date >= date);
    }
}

/// Keeps only the overdue items that have not been alerted yet on `date`, recording them.
pub fn first_alerts(
    overdue: Vec<OverdueItem>,
    date: NaiveDate,
    ledger: &dyn AlertLedger,
) -> Vec<OverdueItem> {
    overdue
        .into_iter()
        .filter(|item| ledger.record(AlertKey::for_item(item, date)))
        .collect()
}
