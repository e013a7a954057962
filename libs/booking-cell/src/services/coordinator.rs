use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use availability_cell::models::AvailabilityError;
use availability_cell::services::slots::is_slot_start;
use availability_cell::services::template::TemplateStore;
use shared_config::AppConfig;
use shared_models::schedule::{SlotTime, Weekday};

use crate::models::{BookingError, Reservation};
use crate::services::ledger::ReservationLedger;

/// Books slots against a provider's published schedule. Validation runs in a
/// fixed order: no template for the weekday, then slot alignment against
/// working hours, then an advisory check for an existing active reservation.
/// The insert itself is the only authoritative step; the database uniqueness
/// constraint decides races that the advisory read cannot see.
pub struct BookingCoordinator {
    ledger: ReservationLedger,
    templates: TemplateStore,
}

impl BookingCoordinator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            ledger: ReservationLedger::new(config),
            templates: TemplateStore::new(config),
        }
    }

    pub async fn book(
        &self,
        provider_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
        auth_token: &str,
    ) -> Result<Reservation, BookingError> {
        let mut retried = false;

        loop {
            let weekday = Weekday::from_date(date);

            let template = self
                .templates
                .get_template_for_day(provider_id, weekday, Some(auth_token))
                .await
                .map_err(availability_error)?
                .ok_or(BookingError::NotAvailableThisDay)?;

            if !is_slot_start(
                template.start_of_day,
                template.end_of_day,
                template.slot_length_minutes,
                slot_time,
            ) {
                return Err(BookingError::OutsideWorkingHours);
            }

            if self
                .ledger
                .has_active_reservation(provider_id, date, slot_time, auth_token)
                .await?
            {
                return Err(BookingError::SlotAlreadyBooked);
            }

            match self
                .ledger
                .insert_scheduled(
                    provider_id,
                    patient_id,
                    date,
                    slot_time,
                    template.slot_length_minutes,
                    auth_token,
                )
                .await
            {
                Ok(reservation) => {
                    info!(
                        "Booked slot {} on {} for provider {}",
                        slot_time, date, provider_id
                    );
                    return Ok(reservation);
                }
                // A concurrent booking won between our read and our write.
                // Re-run the whole validation once in case the loser's view
                // was stale in some other way too; a second conflict is final.
                Err(BookingError::SlotAlreadyBooked) if !retried => {
                    warn!(
                        "Insert conflict for provider {} on {} at {}, revalidating once",
                        provider_id, date, slot_time
                    );
                    retried = true;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn availability_error(err: AvailabilityError) -> BookingError {
    match err {
        AvailabilityError::Validation(msg) => BookingError::Validation(msg),
        AvailabilityError::StorageUnavailable(msg) => BookingError::StorageUnavailable(msg),
        AvailabilityError::Storage(msg) => BookingError::Storage(msg),
    }
}
