use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Medication {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    /// Slot labels in the order the caretaker entered them.
    pub time_slots: Vec<String>,
    pub food_timing: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Medication {
    /// Declared slots. A medication stored without any slot is scheduled for the morning.
    pub fn slots(&self) -> Vec<TimeSlot> {
        if self.time_slots.is_empty() {
            return vec![TimeSlot::Morning];
        }
        self.time_slots
            .iter()
            .map(|s| TimeSlot::from(s.as_str()))
            .collect()
    }

    /// Expected doses per day; a medication without recorded slots still counts once.
    pub fn doses_per_day(&self) -> usize {
        self.time_slots.len().max(1)
    }

    pub fn declares(&self, slot: &TimeSlot) -> bool {
        self.slots().iter().any(|s| s == slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodTiming {
    Before,
    After,
    With,
    Empty,
}

impl FoodTiming {
    pub fn as_str(self) -> &'static str {
        match self {
            FoodTiming::Before => "before",
            FoodTiming::After => "after",
            FoodTiming::With => "with",
            FoodTiming::Empty => "empty",
        }
    }
}

impl FromStr for FoodTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "with" => Ok(Self::With),
            "empty" => Ok(Self::Empty),
            other => Err(format!("unknown food timing '{other}'")),
        }
    }
}

impl fmt::Display for FoodTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
