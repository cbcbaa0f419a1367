pub mod admin;
pub mod bookings;
pub mod calendar;
pub mod health;
pub mod providers;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/providers/:id/availability",
            get(providers::availability).post(providers::availability_with_profile),
        )
        .route("/api/providers/:id/next-slot", get(providers::next_slot))
        .route("/api/providers/:id/services", get(providers::services))
        .route("/api/providers/:id/bookings", get(providers::bookings))
        .route("/api/customers/:id/bookings", get(bookings::customer_bookings))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/status", post(bookings::update_status))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/:id/payment", post(bookings::update_payment))
        .route("/api/bookings/:id/review", post(bookings::add_review))
        .route("/calendar/:booking_id", get(calendar::download_ics))
        .route("/api/admin/cache", get(admin::cache_stats))
        .route("/api/admin/cache/clear", post(admin::clear_cache))
        .route(
            "/api/admin/providers/:id/approve",
            post(admin::approve_provider),
        )
        .route("/api/admin/bookings/:id", delete(admin::purge_booking))
        .with_state(state)
}
