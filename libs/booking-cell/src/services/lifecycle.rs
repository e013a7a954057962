use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{BookingError, Reservation, ReservationStatus};
use crate::services::ledger::ReservationLedger;

/// Guards reservation state changes. Transitions go scheduled -> completed or
/// scheduled -> cancelled and nowhere else; a cancelled reservation releases
/// its slot because the active-row uniqueness index no longer counts it.
pub struct ReservationLifecycle {
    ledger: ReservationLedger,
}

impl ReservationLifecycle {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            ledger: ReservationLedger::new(config),
        }
    }

    pub async fn update_status(
        &self,
        reservation_id: Uuid,
        new_status: ReservationStatus,
        caller: &User,
        auth_token: &str,
    ) -> Result<Reservation, AppError> {
        let reservation = self.ledger.get_by_id(reservation_id, auth_token).await?;

        authorize_status_change(&reservation, new_status, caller)?;

        if !reservation.status.can_transition_to(new_status) {
            return Err(BookingError::InvalidTransition {
                from: reservation.status,
                to: new_status,
            }
            .into());
        }

        let updated = self
            .ledger
            .transition_from_scheduled(reservation_id, new_status, auth_token)
            .await?;

        // An empty match means a concurrent caller moved the row first; the
        // conditional update refused to touch it. Re-read for an accurate
        // error instead of reporting our stale snapshot.
        let Some(updated) = updated else {
            let current = self.ledger.get_by_id(reservation_id, auth_token).await?;
            return Err(BookingError::InvalidTransition {
                from: current.status,
                to: new_status,
            }
            .into());
        };

        info!(
            "Reservation {} moved from {} to {}",
            reservation_id, reservation.status, updated.status
        );

        Ok(updated)
    }
}

/// The provider on a reservation may complete or cancel it; the patient on it
/// may only cancel. Everyone else is turned away before the state machine is
/// even consulted.
fn authorize_status_change(
    reservation: &Reservation,
    new_status: ReservationStatus,
    caller: &User,
) -> Result<(), AppError> {
    let is_provider = caller.id == reservation.provider_id.to_string();
    let is_patient = caller.id == reservation.patient_id.to_string();

    let allowed = match new_status {
        ReservationStatus::Completed => is_provider,
        ReservationStatus::Cancelled => is_provider || is_patient,
        ReservationStatus::Scheduled => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not authorized to change this reservation".to_string(),
        ))
    }
}
