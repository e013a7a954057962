use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::schedule::SlotTime;

/// Lifecycle state of a reservation. Scheduled and completed rows hold their
/// slot; cancelled rows release it for rebooking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    /// Completed and cancelled are terminal. The only legal moves are
    /// scheduled -> completed and scheduled -> cancelled.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Scheduled, ReservationStatus::Completed)
                | (ReservationStatus::Scheduled, ReservationStatus::Cancelled)
        )
    }

    pub fn holds_slot(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReservationStatus::Scheduled => "scheduled",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub slot_time: SlotTime,
    /// Copied from the template's slot length at booking time, so the
    /// reservation keeps its duration even if the template changes later.
    pub duration_minutes: u16,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookSlotRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub slot_time: SlotTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReservationStatusRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider has no working hours on that weekday.
    #[error("The provider is not available on this day")]
    NotAvailableThisDay,

    /// The requested time is not a valid slot start within working hours.
    #[error("The requested time is outside the provider's working hours")]
    OutsideWorkingHours,

    /// Another active reservation already holds the slot.
    #[error("This slot is already booked")]
    SlotAlreadyBooked,

    #[error("Cannot change a {from} reservation to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("Reservation not found")]
    NotFound,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::BadRequest(msg),
            BookingError::NotAvailableThisDay
            | BookingError::OutsideWorkingHours => AppError::BadRequest(err.to_string()),
            BookingError::SlotAlreadyBooked => AppError::Conflict(err.to_string()),
            BookingError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
            BookingError::NotFound => AppError::NotFound("Reservation not found".to_string()),
            BookingError::StorageUnavailable(_) => {
                AppError::Unavailable("Scheduling storage is temporarily unavailable".to_string())
            }
            BookingError::Storage(_) => {
                AppError::Internal("Failed to access reservation data".to_string())
            }
        }
    }
}
