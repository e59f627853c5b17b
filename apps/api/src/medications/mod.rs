pub mod handlers;
pub mod store;

use serde::Deserialize;

use crate::adherence::slots::TimeSlot;
use crate::errors::AppError;
use crate::models::medication::FoodTiming;

/// Body of add / update medication requests.
#[derive(Debug, Clone, Deserialize)]
pub struct MedicationRequest {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub time_slots: Vec<String>,
    #[serde(default)]
    pub food_timing: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A request that passed validation, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub time_slots: Vec<String>,
    pub food_timing: FoodTiming,
    pub notes: Option<String>,
}

impl MedicationRequest {
    pub fn validate(self) -> Result<MedicationInput, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Medication name is required".into()));
        }

        let mut time_slots: Vec<String> = Vec::new();
        for raw in &self.time_slots {
            if raw.trim().is_empty() {
                continue;
            }
            // Known labels are stored in canonical spelling.
            let label = TimeSlot::from(raw.as_str()).as_str().to_string();
            if !time_slots.contains(&label) {
                time_slots.push(label);
            }
        }
        if time_slots.is_empty() {
            return Err(AppError::Validation(
                "At least one time slot is required".into(),
            ));
        }

        let food_timing = match self.food_timing.as_deref() {
            None => FoodTiming::With,
            Some(raw) => raw.parse().map_err(AppError::Validation)?,
        };

        Ok(MedicationInput {
            name,
            dosage: self.dosage.trim().to_string(),
            frequency: self.frequency.trim().to_string(),
            time_slots,
            food_timing,
            notes: self
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}
