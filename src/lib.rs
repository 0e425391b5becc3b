pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/rooms",
            get(handlers::rooms::list_rooms).post(handlers::rooms::create_room),
        )
        .route(
            "/api/rooms/:id",
            put(handlers::rooms::update_room).delete(handlers::rooms::delete_room),
        )
        .route(
            "/api/slots",
            get(handlers::slots::list_slots).post(handlers::slots::create_slot),
        )
        .route("/api/slots/bulk", post(handlers::slots::bulk_create_slots))
        .route(
            "/api/slots/bulk-update",
            put(handlers::slots::bulk_update_slots),
        )
        .route(
            "/api/slots/bulk-delete",
            post(handlers::slots::bulk_delete_slots),
        )
        .route(
            "/api/slots/room/:room_id",
            get(handlers::slots::slots_for_room),
        )
        .route(
            "/api/slots/:id",
            put(handlers::slots::update_slot).delete(handlers::slots::delete_slot),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route(
            "/api/bookings/pending",
            get(handlers::bookings::pending_bookings),
        )
        .route(
            "/api/bookings/:id/approve",
            put(handlers::bookings::approve_booking),
        )
        .route(
            "/api/bookings/:id/reject",
            put(handlers::bookings::reject_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::delete_booking),
        )
        .route(
            "/api/admin-actions",
            get(handlers::admin_actions::list_actions),
        )
        .route(
            "/api/admin-actions/:id/undo",
            post(handlers::admin_actions::undo_action),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .with_state(state)
}
