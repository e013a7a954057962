use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StorageError, SupabaseClient};
use shared_models::schedule::{SlotTime, Weekday};

use crate::models::{AvailabilityError, DayAvailability, DaySchedule};
use crate::services::slots::generate_slots;
use crate::services::template::TemplateStore;

#[derive(Debug, Deserialize)]
struct BookedSlotRow {
    slot_time: SlotTime,
}

/// Resolves a provider's concrete availability for one calendar date by
/// combining the weekly template with the reservations already on the books.
/// Resolution never writes anything, so asking twice for the same state gives
/// the same answer.
pub struct AvailabilityResolver {
    supabase: SupabaseClient,
    templates: TemplateStore,
}

impl AvailabilityResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            templates: TemplateStore::new(config),
        }
    }

    pub async fn resolve(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<DayAvailability, AvailabilityError> {
        let weekday = Weekday::from_date(date);
        debug!(
            "Resolving availability for provider {} on {} (weekday {})",
            provider_id,
            date,
            weekday.index()
        );

        let template = self
            .templates
            .get_template_for_day(provider_id, weekday, auth_token)
            .await?;

        // No template row means the provider does not work this weekday.
        // That is an ordinary answer, not a failure.
        let Some(template) = template else {
            return Ok(DayAvailability::not_available(provider_id, date, weekday));
        };

        let all_slots = generate_slots(
            template.start_of_day,
            template.end_of_day,
            template.slot_length_minutes,
        );

        let taken = self.booked_slots(provider_id, date, auth_token).await?;

        let mut booked = Vec::new();
        let mut free = Vec::new();
        for slot in &all_slots {
            if taken.contains(slot) {
                booked.push(*slot);
            } else {
                free.push(*slot);
            }
        }

        Ok(DayAvailability {
            provider_id,
            date,
            weekday,
            schedule: Some(DaySchedule {
                start_of_day: template.start_of_day,
                end_of_day: template.end_of_day,
                slot_length_minutes: template.slot_length_minutes,
            }),
            all_slots,
            booked_slots: booked,
            free_slots: free,
        })
    }

    /// Slot times held by active reservations on the given date. Cancelled
    /// reservations release their slot, so they are filtered out here.
    async fn booked_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotTime>, AvailabilityError> {
        let path = format!(
            "/rest/v1/reservations?provider_id=eq.{}&date=eq.{}&status=in.(scheduled,completed)&select=slot_time",
            provider_id, date
        );

        let rows = self
            .supabase
            .request::<Vec<BookedSlotRow>>(Method::GET, &path, auth_token, None)
            .await
            .map_err(|err| match err {
                StorageError::Unavailable(msg) => AvailabilityError::StorageUnavailable(msg),
                other => AvailabilityError::Storage(other.to_string()),
            })?;

        Ok(rows.into_iter().map(|row| row.slot_time).collect())
    }
}
