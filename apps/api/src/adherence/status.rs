//! Status Reconciler: joins each medication's declared slots with a day's logs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::models::log::{MarkedBy, MedicationLog};
use crate::models::medication::Medication;

/// Per-slot state for one day. A taken dose always carries the log that proves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DoseStatus {
    Pending,
    Taken {
        log_id: Uuid,
        taken_at: DateTime<Utc>,
        marked_by: MarkedBy,
        proof_photo_url: Option<String>,
    },
}

impl DoseStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, DoseStatus::Pending)
    }

    pub fn log_id(&self) -> Option<Uuid> {
        match self {
            DoseStatus::Pending => None,
            DoseStatus::Taken { log_id, .. } => Some(*log_id),
        }
    }

    /// Status a single log implies; logs that are not `taken` leave the slot pending.
    pub fn from_log(log: &MedicationLog) -> Self {
        if !log.is_taken() {
            return DoseStatus::Pending;
        }
        DoseStatus::Taken {
            log_id: log.id,
            taken_at: log
                .taken_at
                .or(log.updated_at)
                .unwrap_or(log.created_at),
            marked_by: log.marker(),
            proof_photo_url: log.proof_photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatusItem {
    pub medication: Medication,
    pub time_slot: TimeSlot,
    #[serde(flatten)]
    pub status: DoseStatus,
}

/// Builds the status list for one day: one item per medication per declared slot,
/// in medication order then slot order. Slots without a log are pending.
pub fn reconcile(medications: &[Medication], logs: &[MedicationLog]) -> Vec<DailyStatusItem> {
    let mut by_key: HashMap<(Uuid, TimeSlot), &MedicationLog> = HashMap::new();
    for log in logs {
        let key = (log.medication_id, log.slot());
        let replace = by_key
            .get(&key)
            .map_or(true, |current| supersedes(log, current));
        if replace {
            by_key.insert(key, log);
        }
    }

    medications
        .iter()
        .flat_map(|medication| {
            let by_key = &by_key;
            medication.slots().into_iter().map(move |slot| {
                let status = by_key
                    .get(&(medication.id, slot.clone()))
                    .map(|log| DoseStatus::from_log(log))
                    .unwrap_or(DoseStatus::Pending);
                DailyStatusItem {
                    medication: medication.clone(),
                    time_slot: slot,
                    status,
                }
            })
        })
        .collect()
}

/// Duplicate logs for one slot: a taken log wins, otherwise the newest one.
fn supersedes(candidate: &MedicationLog, current: &MedicationLog) -> bool {
    match (candidate.is_taken(), current.is_taken()) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.created_at > current.created_at,
    }
}

/// Merges a fresh reconciliation into what the session already knows.
///
/// A slot the session confirmed as taken stays taken while the fresh read still
/// says pending; the read has simply not observed the write yet. Reverting a
/// taken slot must go through an explicit unmark on the local state.
pub fn merge_with_local(
    previous: &[DailyStatusItem],
    fresh: Vec<DailyStatusItem>,
) -> Vec<DailyStatusItem> {
    let confirmed: HashMap<(Uuid, TimeSlot), &DoseStatus> = previous
        .iter()
        .filter(|item| item.status.log_id().is_some())
        .map(|item| ((item.medication.id, item.time_slot.clone()), &item.status))
        .collect();

    fresh
        .into_iter()
        .map(|item| {
            let local = if item.status.is_pending() {
                confirmed
                    .get(&(item.medication.id, item.time_slot.clone()))
                    .map(|status| (*status).clone())
            } else {
                None
            };
            match local {
                Some(status) => DailyStatusItem { status, ..item },
                None => item,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::log::fixtures::{created_later, taken, with_status};
    use crate::models::log::STATUS_MISSED;
    use crate::models::medication::fixtures::medication;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 12).unwrap()
    }

    #[test]
    fn test_one_item_per_declared_slot() {
        let aspirin = medication("Aspirin", &["Morning", "Evening"]);
        let statin = medication("Statin", &["Night"]);
        let logs = vec![taken(aspirin.id, day(), "Evening")];

        let items = reconcile(&[aspirin.clone(), statin.clone()], &logs);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].time_slot, TimeSlot::Morning);
        assert!(items[0].status.is_pending());
        assert_eq!(items[1].time_slot, TimeSlot::Evening);
        assert_eq!(items[1].status.log_id(), Some(logs[0].id));
        assert_eq!(items[2].medication.id, statin.id);
        assert!(items[2].status.is_pending());
    }

    #[test]
    fn test_reconcile_is_pure() {
        let med = medication("Aspirin", &["Morning", "Afternoon"]);
        let logs = vec![taken(med.id, day(), "Afternoon")];
        let first = reconcile(std::slice::from_ref(&med), &logs);
        let second = reconcile(std::slice::from_ref(&med), &logs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_taken_beats_newer_non_taken_duplicate() {
        let med = medication("Aspirin", &["Morning"]);
        let taken_log = taken(med.id, day(), "Morning");
        let missed = created_later(with_status(taken(med.id, day(), "Morning"), STATUS_MISSED), 60);

        let items = reconcile(std::slice::from_ref(&med), &[taken_log.clone(), missed.clone()]);
        assert_eq!(items[0].status.log_id(), Some(taken_log.id));

        let items = reconcile(std::slice::from_ref(&med), &[missed, taken_log.clone()]);
        assert_eq!(items[0].status.log_id(), Some(taken_log.id));
    }

    #[test]
    fn test_newest_taken_duplicate_wins() {
        let med = medication("Aspirin", &["Morning"]);
        let older = taken(med.id, day(), "Morning");
        let newer = created_later(taken(med.id, day(), "Morning"), 30);

        let items = reconcile(std::slice::from_ref(&med), &[newer.clone(), older]);
        assert_eq!(items[0].status.log_id(), Some(newer.id));
    }

    #[test]
    fn test_log_for_other_medication_is_ignored() {
        let med = medication("Aspirin", &["Morning"]);
        let logs = vec![taken(Uuid::new_v4(), day(), "Morning")];
        let items = reconcile(std::slice::from_ref(&med), &logs);
        assert!(items[0].status.is_pending());
    }

    #[test]
    fn test_unmarked_slot_reverts_to_pending() {
        let med = medication("Aspirin", &["Morning"]);
        let log = taken(med.id, day(), "Morning");
        let before = reconcile(std::slice::from_ref(&med), &[log]);
        assert!(!before[0].status.is_pending());

        // The log row was deleted.
        let after = reconcile(std::slice::from_ref(&med), &[]);
        assert_eq!(after[0].status, DoseStatus::Pending);
        assert_eq!(after[0].status.log_id(), None);
    }

    #[test]
    fn test_local_taken_survives_stale_pending_read() {
        let med = medication("Aspirin", &["Morning", "Evening"]);
        let log = taken(med.id, day(), "Morning");
        let local = reconcile(std::slice::from_ref(&med), &[log.clone()]);
        let stale = reconcile(std::slice::from_ref(&med), &[]);

        let merged = merge_with_local(&local, stale);
        assert_eq!(merged[0].status.log_id(), Some(log.id));
        assert!(merged[1].status.is_pending());
    }

    #[test]
    fn test_authoritative_taken_replaces_local() {
        let med = medication("Aspirin", &["Morning"]);
        let local_log = taken(med.id, day(), "Morning");
        let server_log = taken(med.id, day(), "Morning");
        let local = reconcile(std::slice::from_ref(&med), &[local_log]);
        let fresh = reconcile(std::slice::from_ref(&med), &[server_log.clone()]);

        let merged = merge_with_local(&local, fresh);
        assert_eq!(merged[0].status.log_id(), Some(server_log.id));
    }
}
