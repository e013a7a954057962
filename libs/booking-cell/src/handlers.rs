use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{BookSlotRequest, UpdateReservationStatusRequest};
use crate::services::{
    coordinator::BookingCoordinator, ledger::ReservationLedger, lifecycle::ReservationLifecycle,
};

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user identifier in token".to_string()))
}

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();

    // Booking is a patient action; the patient on the reservation is always
    // the caller, never taken from the request body.
    if !user.is_patient() {
        return Err(AppError::Forbidden(
            "Only patients can book appointments".to_string(),
        ));
    }
    let patient_id = caller_uuid(&user)?;

    let coordinator = BookingCoordinator::new(&state);
    let reservation = coordinator
        .book(
            request.provider_id,
            patient_id,
            request.date,
            request.slot_time,
            token,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!(reservation))))
}

#[axum::debug_handler]
pub async fn list_reservations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let caller_id = caller_uuid(&user)?;
    let ledger = ReservationLedger::new(&state);

    let reservations = if user.is_doctor() {
        ledger.list_for_provider(caller_id, token).await?
    } else {
        ledger.list_for_patient(caller_id, token).await?
    };

    Ok(Json(json!({ "reservations": reservations })))
}

#[axum::debug_handler]
pub async fn update_reservation_status(
    State(state): State<Arc<AppConfig>>,
    Path(reservation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateReservationStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let lifecycle = ReservationLifecycle::new(&state);

    let reservation = lifecycle
        .update_status(reservation_id, request.status, &user, token)
        .await?;

    Ok(Json(json!(reservation)))
}
