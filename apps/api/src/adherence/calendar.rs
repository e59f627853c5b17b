use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;
use crate::adherence::stats::month_bounds;
use crate::models::log::MedicationLog;
use crate::models::medication::Medication;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Taken,
    Missed,
}

/// Rolls a month of logs up into one status per day.
///
/// A day is `Taken` when every expected dose has a distinct taken log, otherwise
/// `Missed`. Days after `today` get no entry, and neither does any day when no
/// dose is expected at all.
pub fn aggregate_month(
    medications: &[Medication],
    logs: &[MedicationLog],
    year: i32,
    month: u32,
    today: NaiveDate,
) -> BTreeMap<NaiveDate, DayStatus> {
    let mut statuses = BTreeMap::new();
    let Some((first, last)) = month_bounds(year, month) else {
        return statuses;
    };

    let expected_per_day: usize = medications.iter().map(Medication::doses_per_day).sum();
    if expected_per_day == 0 {
        return statuses;
    }

    let mut taken_by_day: HashMap<NaiveDate, HashSet<(Uuid, TimeSlot)>> = HashMap::new();
    for log in logs.iter().filter(|l| l.is_taken()) {
        taken_by_day
            .entry(log.log_date)
            .or_default()
            .insert((log.medication_id, log.slot()));
    }

    for day in first.iter_days().take_while(|d| *d <= last && *d <= today) {
        let taken = taken_by_day.get(&day).map_or(0, HashSet::len);
        let status = if taken >= expected_per_day {
            DayStatus::Taken
        } else {
            DayStatus::Missed
        };
        statuses.insert(day, status);
    }

    statuses
}
