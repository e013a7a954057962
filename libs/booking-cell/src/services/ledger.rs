use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StorageError, SupabaseClient};
use shared_models::schedule::SlotTime;

use crate::models::{BookingError, Reservation, ReservationStatus};

/// Storage access for the reservations table. The table carries a partial
/// unique index on (provider_id, date, slot_time) restricted to scheduled and
/// completed rows, so at most one active reservation can ever hold a slot no
/// matter how many writers race.
pub struct ReservationLedger {
    supabase: SupabaseClient,
}

impl ReservationLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Insert a new scheduled reservation. The database uniqueness constraint
    /// is the arbiter here; a conflict means another active reservation holds
    /// the slot, regardless of what any earlier read said.
    pub async fn insert_scheduled(
        &self,
        provider_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
        duration_minutes: u16,
        auth_token: &str,
    ) -> Result<Reservation, BookingError> {
        debug!(
            "Inserting reservation for provider {} on {} at {}",
            provider_id, date, slot_time
        );

        let body = json!({
            "provider_id": provider_id,
            "patient_id": patient_id,
            "date": date,
            "slot_time": slot_time.to_string(),
            "duration_minutes": duration_minutes,
            "status": "scheduled",
        });

        let mut rows = self
            .supabase
            .request_with_headers::<Vec<Reservation>>(
                Method::POST,
                "/rest/v1/reservations",
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|err| match err {
                StorageError::Conflict(_) => BookingError::SlotAlreadyBooked,
                other => storage_error(other),
            })?;

        let reservation = rows.pop().ok_or_else(|| {
            BookingError::Storage("insert returned no reservation row".to_string())
        })?;

        info!("Created reservation {}", reservation.id);
        Ok(reservation)
    }

    pub async fn get_by_id(
        &self,
        reservation_id: Uuid,
        auth_token: &str,
    ) -> Result<Reservation, BookingError> {
        let path = format!("/rest/v1/reservations?id=eq.{}&limit=1", reservation_id);

        let mut rows = self
            .supabase
            .request::<Vec<Reservation>>(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(storage_error)?;

        rows.pop().ok_or(BookingError::NotFound)
    }

    /// Whether an active reservation already holds the slot. Advisory only;
    /// the insert's uniqueness constraint makes the final call.
    pub async fn has_active_reservation(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
        auth_token: &str,
    ) -> Result<bool, BookingError> {
        let path = format!(
            "/rest/v1/reservations?provider_id=eq.{}&date=eq.{}&slot_time=eq.{}&status=in.(scheduled,completed)&select=id&limit=1",
            provider_id, date, slot_time
        );

        let rows = self
            .supabase
            .request::<Vec<serde_json::Value>>(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(storage_error)?;

        Ok(!rows.is_empty())
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Reservation>, BookingError> {
        let path = format!(
            "/rest/v1/reservations?patient_id=eq.{}&order=date.desc,slot_time.asc",
            patient_id
        );

        self.supabase
            .request::<Vec<Reservation>>(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(storage_error)
    }

    pub async fn list_for_provider(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Reservation>, BookingError> {
        let path = format!(
            "/rest/v1/reservations?provider_id=eq.{}&order=date.desc,slot_time.asc",
            provider_id
        );

        self.supabase
            .request::<Vec<Reservation>>(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(storage_error)
    }

    /// Conditional transition out of `scheduled`. The status filter rides on
    /// the PATCH itself, so a row that a concurrent caller already moved to a
    /// terminal state is never rewritten; the update simply matches nothing
    /// and `None` comes back. The application-level guard in the lifecycle
    /// service is advisory, this filter is the arbiter.
    pub async fn transition_from_scheduled(
        &self,
        reservation_id: Uuid,
        status: ReservationStatus,
        auth_token: &str,
    ) -> Result<Option<Reservation>, BookingError> {
        let path = format!(
            "/rest/v1/reservations?id=eq.{}&status=eq.scheduled",
            reservation_id
        );
        let body = json!({
            "status": status.to_string(),
            "updated_at": chrono::Utc::now(),
        });

        let mut rows = self
            .supabase
            .request_with_headers::<Vec<Reservation>>(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(storage_error)?;

        Ok(rows.pop())
    }
}

fn storage_error(err: StorageError) -> BookingError {
    match err {
        StorageError::Unavailable(msg) => BookingError::StorageUnavailable(msg),
        StorageError::NotFound(_) => BookingError::NotFound,
        other => BookingError::Storage(other.to_string()),
    }
}
