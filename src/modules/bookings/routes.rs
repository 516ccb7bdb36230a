use super::handlers::{approve_booking, create_booking, reject_booking, verify_booking};
use crate::app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/book", post(create_booking))
        .route("/bookings/verify", get(verify_booking))
        .route("/bookings/approve", get(approve_booking))
        .route("/bookings/reject", get(reject_booking))
}
