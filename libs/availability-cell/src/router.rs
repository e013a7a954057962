use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Reads are public; schedule writes require an authenticated doctor.
    let public_routes = Router::new()
        .route("/{provider_id}/schedule", get(handlers::get_weekly_schedule))
        .route(
            "/{provider_id}/availability",
            get(handlers::get_day_availability),
        );

    let protected_routes = Router::new()
        .route(
            "/{provider_id}/schedule",
            put(handlers::replace_weekly_schedule),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
