#![allow(dead_code)]

//! Named time slots and their daily deadlines.
//!
//! Deadlines are minutes since local midnight. A label outside the four known
//! slots is carried through untouched but has no deadline, so it can never be
//! reported as missed.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MORNING_DEADLINE: u32 = 9 * 60;
pub const AFTERNOON_DEADLINE: u32 = 13 * 60 + 30;
pub const EVENING_DEADLINE: u32 = 17 * 60;
pub const NIGHT_DEADLINE: u32 = 21 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    Night,
    Other(String),
}

pub static KNOWN_SLOTS: [TimeSlot; 4] = [
    TimeSlot::Morning,
    TimeSlot::Afternoon,
    TimeSlot::Evening,
    TimeSlot::Night,
];

impl TimeSlot {
    pub fn deadline_minutes(&self) -> Option<u32> {
        match self {
            TimeSlot::Morning => Some(MORNING_DEADLINE),
            TimeSlot::Afternoon => Some(AFTERNOON_DEADLINE),
            TimeSlot::Evening => Some(EVENING_DEADLINE),
            TimeSlot::Night => Some(NIGHT_DEADLINE),
            TimeSlot::Other(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TimeSlot::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            TimeSlot::Morning => "Morning",
            TimeSlot::Afternoon => "Afternoon",
            TimeSlot::Evening => "Evening",
            TimeSlot::Night => "Night",
            TimeSlot::Other(label) => label,
        }
    }
}

/// All four deadlines in chronological order.
pub fn deadlines() -> impl Iterator<Item = u32> {
    KNOWN_SLOTS.iter().filter_map(TimeSlot::deadline_minutes)
}

impl FromStr for TimeSlot {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_lowercase().as_str() {
            "morning" => Self::Morning,
            "afternoon" => Self::Afternoon,
            "evening" => Self::Evening,
            "night" => Self::Night,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl From<&str> for TimeSlot {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(slot) => slot,
            Err(never) => match never {},
        }
    }
}

impl From<String> for TimeSlot {
    fn from(s: String) -> Self {
        TimeSlot::from(s.as_str())
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.to_string()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_table() {
        assert_eq!(TimeSlot::Morning.deadline_minutes(), Some(540));
        assert_eq!(TimeSlot::Afternoon.deadline_minutes(), Some(810));
        assert_eq!(TimeSlot::Evening.deadline_minutes(), Some(1020));
        assert_eq!(TimeSlot::Night.deadline_minutes(), Some(1260));
    }

    #[test]
    fn test_unknown_label_has_no_deadline() {
        let slot = TimeSlot::from("Bedtime");
        assert_eq!(slot, TimeSlot::Other("Bedtime".into()));
        assert_eq!(slot.deadline_minutes(), None);
        assert!(!slot.is_known());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(TimeSlot::from(" evening "), TimeSlot::Evening);
        assert_eq!(TimeSlot::Evening.to_string(), "Evening");
    }

    #[test]
    fn test_deadlines_are_sorted() {
        let all: Vec<u32> = deadlines().collect();
        assert_eq!(all, vec![540, 810, 1020, 1260]);
    }

    #[test]
    fn test_serde_uses_label() {
        let json = serde_json::to_string(&TimeSlot::Night).unwrap();
        assert_eq!(json, "\"Night\"");
        let back: TimeSlot = serde_json::from_str("\"Noon\"").unwrap();
        assert_eq!(back, TimeSlot::Other("Noon".into()));
    }
}
