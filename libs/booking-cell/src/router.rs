use std::sync::Arc;

use axum::{
    middleware,
    routing::{patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::book_slot).get(handlers::list_reservations))
        .route("/{reservation_id}/status", patch(handlers::update_reservation_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
