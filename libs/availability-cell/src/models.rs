use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::schedule::{SlotTime, Weekday};

pub const DEFAULT_SLOT_LENGTH_MINUTES: u16 = 60;

/// One weekday's working hours for a provider. At most one row exists per
/// (provider, weekday); the schedule for a provider is replaced as a whole
/// set, never patched per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub weekday: Weekday,
    pub start_of_day: SlotTime,
    pub end_of_day: SlotTime,
    pub slot_length_minutes: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single entry in a replace-schedule request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub weekday: Weekday,
    pub start_of_day: SlotTime,
    pub end_of_day: SlotTime,
    pub slot_length_minutes: Option<u16>,
}

impl ScheduleEntry {
    pub fn slot_length(&self) -> u16 {
        self.slot_length_minutes.unwrap_or(DEFAULT_SLOT_LENGTH_MINUTES)
    }

    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.start_of_day >= self.end_of_day {
            return Err(AvailabilityError::Validation(format!(
                "start of day {} must be before end of day {}",
                self.start_of_day, self.end_of_day
            )));
        }
        if self.slot_length() == 0 {
            return Err(AvailabilityError::Validation(
                "slot length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceScheduleRequest {
    pub schedule: Vec<ScheduleEntry>,
}

/// The working-hours window that applied to a resolved date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub start_of_day: SlotTime,
    pub end_of_day: SlotTime,
    pub slot_length_minutes: u16,
}

/// Caller-visible free/booked partition for one provider on one date.
/// `schedule: None` means the provider does not work that weekday; that is a
/// normal negative result, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub schedule: Option<DaySchedule>,
    pub all_slots: Vec<SlotTime>,
    pub booked_slots: Vec<SlotTime>,
    pub free_slots: Vec<SlotTime>,
}

impl DayAvailability {
    pub fn not_available(provider_id: Uuid, date: NaiveDate, weekday: Weekday) -> Self {
        Self {
            provider_id,
            date,
            weekday,
            schedule: None,
            all_slots: Vec::new(),
            booked_slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Validation(msg) => AppError::BadRequest(msg),
            AvailabilityError::StorageUnavailable(_) => {
                AppError::Unavailable("Scheduling storage is temporarily unavailable".to_string())
            }
            AvailabilityError::Storage(_) => {
                AppError::Internal("Failed to access availability data".to_string())
            }
        }
    }
}
