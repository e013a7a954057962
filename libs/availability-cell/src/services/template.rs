use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StorageError, SupabaseClient};
use shared_models::schedule::Weekday;

use crate::models::{AvailabilityError, ScheduleEntry, WeeklyAvailability};

/// Storage access for weekly availability templates. The schedule for a
/// provider is always written as a whole set through a single transactional
/// procedure, so readers never observe a half-replaced week.
pub struct TemplateStore {
    supabase: SupabaseClient,
}

impl TemplateStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Schedule reads are public; without a caller token the anon key alone
    /// authenticates the request.
    pub async fn get_weekly_schedule(
        &self,
        provider_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<WeeklyAvailability>, AvailabilityError> {
        debug!("Fetching weekly schedule for provider {}", provider_id);

        let path = format!(
            "/rest/v1/weekly_availability?provider_id=eq.{}&order=weekday.asc",
            provider_id
        );

        self.supabase
            .request::<Vec<WeeklyAvailability>>(Method::GET, &path, auth_token, None)
            .await
            .map_err(storage_error)
    }

    /// The template row for one weekday, or None when the provider does not
    /// work that day.
    pub async fn get_template_for_day(
        &self,
        provider_id: Uuid,
        weekday: Weekday,
        auth_token: Option<&str>,
    ) -> Result<Option<WeeklyAvailability>, AvailabilityError> {
        debug!(
            "Fetching template for provider {} on weekday {}",
            provider_id,
            weekday.index()
        );

        let path = format!(
            "/rest/v1/weekly_availability?provider_id=eq.{}&weekday=eq.{}&limit=1",
            provider_id,
            weekday.index()
        );

        let mut rows = self
            .supabase
            .request::<Vec<WeeklyAvailability>>(Method::GET, &path, auth_token, None)
            .await
            .map_err(storage_error)?;

        Ok(rows.pop())
    }

    /// Replace the provider's whole weekly schedule. The submitted set fully
    /// defines the new week; weekdays not listed become non-working days. An
    /// empty set clears the schedule entirely. The swap happens inside one
    /// database transaction, so concurrent readers see either the old week or
    /// the new week, never an empty window in between.
    pub async fn replace_weekly_schedule(
        &self,
        provider_id: Uuid,
        entries: &[ScheduleEntry],
        auth_token: &str,
    ) -> Result<Vec<WeeklyAvailability>, AvailabilityError> {
        let mut seen = [false; 7];
        for entry in entries {
            entry.validate()?;

            let index = entry.weekday.index() as usize;
            if seen[index] {
                return Err(AvailabilityError::Validation(format!(
                    "weekday {} appears more than once in the schedule",
                    entry.weekday.index()
                )));
            }
            seen[index] = true;
        }

        let schedule: Vec<_> = entries
            .iter()
            .map(|entry| {
                json!({
                    "weekday": entry.weekday.index(),
                    "start_of_day": entry.start_of_day.to_string(),
                    "end_of_day": entry.end_of_day.to_string(),
                    "slot_length_minutes": entry.slot_length(),
                })
            })
            .collect();

        let body = json!({
            "p_provider_id": provider_id,
            "p_schedule": schedule,
        });

        let rows = self
            .supabase
            .request::<Vec<WeeklyAvailability>>(
                Method::POST,
                "/rest/v1/rpc/replace_weekly_schedule",
                Some(auth_token),
                Some(body),
            )
            .await
            .map_err(storage_error)?;

        info!(
            "Replaced weekly schedule for provider {} with {} working days",
            provider_id,
            rows.len()
        );

        Ok(rows)
    }
}

fn storage_error(err: StorageError) -> AvailabilityError {
    match err {
        StorageError::Unavailable(msg) => AvailabilityError::StorageUnavailable(msg),
        other => AvailabilityError::Storage(other.to_string()),
    }
}
