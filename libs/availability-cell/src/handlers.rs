use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::ReplaceScheduleRequest;
use crate::services::{resolver::AvailabilityResolver, template::TemplateStore};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

// Schedule and availability reads are public so patients can browse
// providers before signing in; only the anon key reaches storage.

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let store = TemplateStore::new(&state);

    let schedule = store.get_weekly_schedule(provider_id, None).await?;

    Ok(Json(json!({ "schedule": schedule })))
}

#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let resolver = AvailabilityResolver::new(&state);

    let availability = resolver.resolve(provider_id, query.date, None).await?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn replace_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReplaceScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Only a doctor can publish a schedule, and only their own.
    if !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Only doctors can manage availability schedules".to_string(),
        ));
    }
    if user.id != provider_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to manage this provider's schedule".to_string(),
        ));
    }

    let store = TemplateStore::new(&state);
    let schedule = store
        .replace_weekly_schedule(provider_id, &request.schedule, token)
        .await?;

    Ok(Json(json!({ "schedule": schedule })))
}
