// libs/booking-cell/tests/booking_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::{Extension, Path, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::services::resolver::AvailabilityResolver;
use booking_cell::handlers;
use booking_cell::models::{BookSlotRequest, BookingError, UpdateReservationStatusRequest};
use booking_cell::services::coordinator::BookingCoordinator;
use booking_cell::services::lifecycle::ReservationLifecycle;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::schedule::SlotTime;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn config_for(server: &MockServer) -> AppConfig {
    TestConfig::with_storage_url(&server.uri()).to_app_config()
}

fn auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn t(h: u16, m: u16) -> SlotTime {
    SlotTime::from_hm(h, m).unwrap()
}

// 2025-06-02 is a Monday.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn template_row(provider_id: Uuid, weekday: u8) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "provider_id": provider_id,
        "weekday": weekday,
        "start_of_day": "09:00",
        "end_of_day": "12:00",
        "slot_length_minutes": 60,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

fn reservation_row(
    provider_id: Uuid,
    patient_id: Uuid,
    slot: &str,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "provider_id": provider_id,
        "patient_id": patient_id,
        "date": "2025-06-02",
        "slot_time": slot,
        "duration_minutes": 60,
        "status": status,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

async fn mount_monday_template(server: &MockServer, provider_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            template_row(provider_id, 1)
        ])))
        .mount(server)
        .await;
}

async fn mount_no_active_reservations(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("status", "in.(scheduled,completed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn book_creates_a_scheduled_reservation() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;
    mount_no_active_reservations(&server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            reservation_row(provider_id, patient_id, "09:00", "scheduled")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let reservation = coordinator
        .book(provider_id, patient_id, monday(), t(9, 0), "token")
        .await
        .unwrap();

    assert_eq!(reservation.provider_id, provider_id);
    assert_eq!(reservation.patient_id, patient_id);
    assert_eq!(reservation.slot_time, t(9, 0));
}

#[tokio::test]
async fn booking_on_a_day_off_is_rejected_first() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let err = coordinator
        .book(Uuid::new_v4(), Uuid::new_v4(), monday(), t(9, 0), "token")
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::NotAvailableThisDay);
}

#[tokio::test]
async fn misaligned_time_is_outside_working_hours() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;

    let coordinator = BookingCoordinator::new(&config_for(&server));

    // 08:30 is before opening; 09:30 is off the 60-minute grid; 12:00 has no
    // room for a full slot.
    for time in [t(8, 30), t(9, 30), t(12, 0)] {
        let err = coordinator
            .book(provider_id, Uuid::new_v4(), monday(), time, "token")
            .await
            .unwrap_err();
        assert_matches!(err, BookingError::OutsideWorkingHours);
    }
}

#[tokio::test]
async fn known_taken_slot_is_rejected_without_an_insert() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4() }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let err = coordinator
        .book(provider_id, Uuid::new_v4(), monday(), t(9, 0), "token")
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::SlotAlreadyBooked);
}

#[tokio::test]
async fn insert_conflict_revalidates_once_then_reports_taken() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;
    mount_no_active_reservations(&server).await;

    // The uniqueness index rejects both attempts; one revalidation pass is
    // allowed, then the conflict is final.
    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .expect(2)
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let err = coordinator
        .book(provider_id, Uuid::new_v4(), monday(), t(10, 0), "token")
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::SlotAlreadyBooked);
}

#[tokio::test]
async fn concurrent_bookings_produce_exactly_one_winner() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;
    mount_no_active_reservations(&server).await;

    // The storage uniqueness constraint lets exactly one insert through.
    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            reservation_row(provider_id, Uuid::new_v4(), "09:00", "scheduled")
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let slot = t(9, 0);

    let (a, b, c, d) = tokio::join!(
        coordinator.book(provider_id, Uuid::new_v4(), monday(), slot, "token"),
        coordinator.book(provider_id, Uuid::new_v4(), monday(), slot, "token"),
        coordinator.book(provider_id, Uuid::new_v4(), monday(), slot, "token"),
        coordinator.book(provider_id, Uuid::new_v4(), monday(), slot, "token"),
    );

    let results = [a, b, c, d];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(BookingError::SlotAlreadyBooked));
    }
}

#[tokio::test]
async fn cancelled_reservations_do_not_block_rebooking() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;

    // The active-reservation read filters on status, so a cancelled row for
    // the same slot never shows up in it.
    mount_no_active_reservations(&server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            reservation_row(provider_id, patient_id, "11:00", "scheduled")
        ])))
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let reservation = coordinator
        .book(provider_id, patient_id, monday(), t(11, 0), "token")
        .await
        .unwrap();

    assert_eq!(reservation.slot_time, t(11, 0));
}

#[tokio::test]
async fn storage_outage_during_booking_is_unavailable_not_a_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_availability"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let coordinator = BookingCoordinator::new(&config_for(&server));
    let err = coordinator
        .book(Uuid::new_v4(), Uuid::new_v4(), monday(), t(9, 0), "token")
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::StorageUnavailable(_));

    let app_err: AppError = err.into();
    assert_matches!(app_err, AppError::Unavailable(_));
}

#[tokio::test]
async fn provider_completes_a_scheduled_reservation() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let provider_id = Uuid::parse_str(&doctor.id).unwrap();
    let patient_id = Uuid::new_v4();

    let scheduled = reservation_row(provider_id, patient_id, "09:00", "scheduled");
    let reservation_id = scheduled["id"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&server)
        .await;

    let mut completed = reservation_row(provider_id, patient_id, "09:00", "completed");
    completed["id"] = json!(reservation_id);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&server)
        .await;

    let lifecycle = ReservationLifecycle::new(&config_for(&server));
    let updated = lifecycle
        .update_status(
            Uuid::parse_str(&reservation_id).unwrap(),
            booking_cell::models::ReservationStatus::Completed,
            &doctor.to_user(),
            "token",
        )
        .await
        .unwrap();

    assert_eq!(
        updated.status,
        booking_cell::models::ReservationStatus::Completed
    );
}

#[tokio::test]
async fn terminal_reservations_cannot_move_again() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let provider_id = Uuid::parse_str(&doctor.id).unwrap();

    let cancelled = reservation_row(provider_id, Uuid::new_v4(), "09:00", "cancelled");
    let reservation_id = cancelled["id"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let lifecycle = ReservationLifecycle::new(&config_for(&server));
    let err = lifecycle
        .update_status(
            Uuid::parse_str(&reservation_id).unwrap(),
            booking_cell::models::ReservationStatus::Completed,
            &doctor.to_user(),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err, AppError::BadRequest(_));
}

#[tokio::test]
async fn stale_snapshot_cannot_rewrite_a_terminal_state() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let provider_id = Uuid::parse_str(&doctor.id).unwrap();

    let scheduled = reservation_row(provider_id, Uuid::new_v4(), "09:00", "scheduled");
    let reservation_id = scheduled["id"].as_str().unwrap().to_string();
    let mut completed = reservation_row(provider_id, Uuid::new_v4(), "09:00", "completed");
    completed["id"] = json!(reservation_id);

    // The first read still sees the scheduled row; by the time the update
    // lands, another caller has completed the reservation.
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&server)
        .await;

    // The conditional update only touches rows still in `scheduled`, so it
    // matches nothing here.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let lifecycle = ReservationLifecycle::new(&config_for(&server));
    let err = lifecycle
        .update_status(
            Uuid::parse_str(&reservation_id).unwrap(),
            booking_cell::models::ReservationStatus::Cancelled,
            &doctor.to_user(),
            "token",
        )
        .await
        .unwrap_err();

    assert_matches!(err, AppError::BadRequest(_));
}

#[tokio::test]
async fn concurrent_transitions_have_exactly_one_winner() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let provider_id = Uuid::parse_str(&doctor.id).unwrap();

    let scheduled = reservation_row(provider_id, Uuid::new_v4(), "09:00", "scheduled");
    let reservation_id = Uuid::parse_str(scheduled["id"].as_str().unwrap()).unwrap();
    let mut completed = scheduled.clone();
    completed["status"] = json!("completed");

    // Both callers read the same scheduled snapshot.
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&server)
        .await;

    // The status filter on the update lets exactly one through; the loser's
    // update matches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let lifecycle = ReservationLifecycle::new(&config_for(&server));
    let caller = doctor.to_user();

    let (complete, cancel) = tokio::join!(
        lifecycle.update_status(
            reservation_id,
            booking_cell::models::ReservationStatus::Completed,
            &caller,
            "token",
        ),
        lifecycle.update_status(
            reservation_id,
            booking_cell::models::ReservationStatus::Cancelled,
            &caller,
            "token",
        ),
    );

    let winners = [&complete, &cancel].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn booked_slot_appears_in_resolution() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_monday_template(&server, provider_id).await;

    // Before the booking the slot is free.
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            reservation_row(provider_id, patient_id, "10:00", "scheduled")
        ])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let coordinator = BookingCoordinator::new(&config);
    coordinator
        .book(provider_id, patient_id, monday(), t(10, 0), "token")
        .await
        .unwrap();

    // Afterwards the reservation shows up in reads.
    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "slot_time": "10:00" }
        ])))
        .mount(&server)
        .await;

    let resolver = AvailabilityResolver::new(&config);
    let day = resolver.resolve(provider_id, monday(), None).await.unwrap();

    assert_eq!(day.booked_slots, vec![t(10, 0)]);
    assert_eq!(day.free_slots, vec![t(9, 0), t(11, 0)]);
    assert!(!day.free_slots.contains(&t(10, 0)));
}

#[tokio::test]
async fn only_patients_can_book() {
    let server = MockServer::start().await;
    let test_config = TestConfig::with_storage_url(&server.uri());
    let state = test_config.to_arc();

    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);

    let result = handlers::book_slot(
        State(state),
        auth_header(&token),
        Extension(doctor.to_user()),
        Json(BookSlotRequest {
            provider_id: Uuid::new_v4(),
            date: monday(),
            slot_time: t(9, 0),
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn booking_handler_uses_the_caller_as_the_patient() {
    let server = MockServer::start().await;
    let test_config = TestConfig::with_storage_url(&server.uri());
    let state = test_config.to_arc();

    let patient = TestUser::patient("pat@example.com");
    let patient_id = Uuid::parse_str(&patient.id).unwrap();
    let provider_id = Uuid::new_v4();
    let token = JwtTestUtils::create_test_token(&patient, &test_config.jwt_secret, None);

    mount_monday_template(&server, provider_id).await;
    mount_no_active_reservations(&server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            reservation_row(provider_id, patient_id, "10:00", "scheduled")
        ])))
        .mount(&server)
        .await;

    let (status, Json(body)) = handlers::book_slot(
        State(state),
        auth_header(&token),
        Extension(patient.to_user()),
        Json(BookSlotRequest {
            provider_id,
            date: monday(),
            slot_time: t(10, 0),
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(body["patient_id"], json!(patient_id));
    assert_eq!(body["status"], json!("scheduled"));
}

#[tokio::test]
async fn listing_follows_the_caller_role() {
    let server = MockServer::start().await;
    let test_config = TestConfig::with_storage_url(&server.uri());
    let state = test_config.to_arc();

    let doctor = TestUser::doctor("doc@example.com");
    let provider_id = Uuid::parse_str(&doctor.id).unwrap();
    let token = JwtTestUtils::create_test_token(&doctor, &test_config.jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reservation_row(provider_id, Uuid::new_v4(), "09:00", "scheduled"),
            reservation_row(provider_id, Uuid::new_v4(), "10:00", "completed")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = handlers::list_reservations(
        State(Arc::clone(&state)),
        auth_header(&token),
        Extension(doctor.to_user()),
    )
    .await
    .unwrap();

    assert_eq!(body["reservations"].as_array().unwrap().len(), 2);

    let patient = TestUser::patient("pat@example.com");
    let patient_id = Uuid::parse_str(&patient.id).unwrap();
    let token = JwtTestUtils::create_test_token(&patient, &test_config.jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            reservation_row(Uuid::new_v4(), patient_id, "11:00", "scheduled")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let Json(body) = handlers::list_reservations(
        State(state),
        auth_header(&token),
        Extension(patient.to_user()),
    )
    .await
    .unwrap();

    assert_eq!(body["reservations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn status_handler_passes_the_caller_through() {
    let server = MockServer::start().await;
    let test_config = TestConfig::with_storage_url(&server.uri());
    let state = test_config.to_arc();

    let outsider = TestUser::patient("other@example.com");
    let token = JwtTestUtils::create_test_token(&outsider, &test_config.jwt_secret, None);

    let scheduled = reservation_row(Uuid::new_v4(), Uuid::new_v4(), "09:00", "scheduled");
    let reservation_id = Uuid::parse_str(scheduled["id"].as_str().unwrap()).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reservations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&server)
        .await;

    let result = handlers::update_reservation_status(
        State(state),
        Path(reservation_id),
        auth_header(&token),
        Extension(outsider.to_user()),
        Json(UpdateReservationStatusRequest {
            status: booking_cell::models::ReservationStatus::Cancelled,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}
