use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;

pub const STATUS_TAKEN: &str = "taken";
/// Reserved. Nothing in the service writes it; missed doses are derived from absent logs.
pub const STATUS_MISSED: &str = "missed";

/// A persisted dose record. At most one exists per (account, medication, day, slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MedicationLog {
    pub id: Uuid,
    pub account_id: Uuid,
    pub medication_id: Uuid,
    pub log_date: NaiveDate,
    pub time_slot: String,
    pub status: String,
    pub taken_at: Option<DateTime<Utc>>,
    pub marked_by: Option<String>,
    pub proof_photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MedicationLog {
    pub fn is_taken(&self) -> bool {
        self.status == STATUS_TAKEN
    }

    pub fn is_missed(&self) -> bool {
        self.status == STATUS_MISSED
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot::from(self.time_slot.as_str())
    }

    /// Who marked the dose; rows written before the field existed count as the patient.
    pub fn marker(&self) -> MarkedBy {
        self.marked_by
            .as_deref()
            .and_then(|m| m.parse().ok())
            .unwrap_or(MarkedBy::Patient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkedBy {
    Patient,
    Caretaker,
}

impl MarkedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkedBy::Patient => "patient",
            MarkedBy::Caretaker => "caretaker",
        }
    }
}

impl FromStr for MarkedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "caretaker" => Ok(Self::Caretaker),
            other => Err(format!("unknown marker '{other}'")),
        }
    }
}

impl fmt::Display for MarkedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub mod fixtures {
    use chrono::Duration;

    use super::*;

    pub fn taken(medication_id: Uuid, date: NaiveDate, slot: &str) -> MedicationLog {
        MedicationLog {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            medication_id,
            log_date: date,
            time_slot: slot.to_string(),
            status: STATUS_TAKEN.to_string(),
            taken_at: Some(Utc::now()),
            marked_by: Some(MarkedBy::Patient.as_str().to_string()),
            proof_photo_url: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_status(mut log: MedicationLog, status: &str) -> MedicationLog {
        log.status = status.to_string();
        log
    }

    pub fn created_later(mut log: MedicationLog, seconds: i64) -> MedicationLog {
        log.created_at += Duration::seconds(seconds);
        log
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_marker_defaults_to_patient() {
        let mut log = taken(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), "Morning");
        log.marked_by = None;
        assert_eq!(log.marker(), MarkedBy::Patient);
        log.marked_by = Some("Caretaker".into());
        assert_eq!(log.marker(), MarkedBy::Caretaker);
    }

    #[test]
    fn test_status_helpers() {
        let log = taken(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), "Night");
        assert!(log.is_taken());
        assert_eq!(log.slot(), TimeSlot::Night);
        let missed = with_status(log, STATUS_MISSED);
        assert!(missed.is_missed());
        assert!(!missed.is_taken());
    }
}
