use super::handlers::{day_availability, week_availability};
use crate::app_state::AppState;
use axum::{routing::get, Router};

pub fn availability_routes() -> Router<AppState> {
    Router::new()
        .route("/availability", get(day_availability))
        .route("/availability/week", get(week_availability))
}
