use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::booking::{BookingError, BookingRequest, CreateOutcome};
use crate::error::AppResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
}

/// POST /book
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> AppResult<Json<CreateResponse>> {
    let message =
        "Almost there! Check your email and click the verification link to confirm your booking."
            .to_string();

    match state.lifecycle.create(request).await? {
        CreateOutcome::Created { booking_id } => Ok(Json(CreateResponse {
            success: true,
            message,
            booking_id: Some(booking_id),
        })),
        // Indistinguishable from success on the wire.
        CreateOutcome::FeignedSuccess => Ok(Json(CreateResponse {
            success: true,
            message,
            booking_id: None,
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// GET /bookings/verify?token=...
pub async fn verify_booking(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Redirect {
    let base = state.env.booking.public_url.clone();
    let Some(token) = parse_token(&query) else {
        return error_redirect(&base, reason_for_missing(&query));
    };

    match state.lifecycle.verify(token).await {
        Ok(_) => Redirect::to(&format!("{base}/book/verified")),
        Err(error) => error_redirect(&base, reason_for(&error)),
    }
}

/// GET /bookings/approve?token=...
pub async fn approve_booking(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Redirect {
    let base = state.env.booking.public_url.clone();
    let Some(token) = parse_token(&query) else {
        return error_redirect(&base, reason_for_missing(&query));
    };

    match state.lifecycle.approve(token).await {
        Ok(_) => Redirect::to(&format!("{base}/book/approved")),
        Err(error) => error_redirect(&base, reason_for(&error)),
    }
}

/// GET /bookings/reject?token=...
pub async fn reject_booking(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Redirect {
    let base = state.env.booking.public_url.clone();
    let Some(token) = parse_token(&query) else {
        return error_redirect(&base, reason_for_missing(&query));
    };

    match state.lifecycle.reject(token).await {
        Ok(_) => Redirect::to(&format!("{base}/book/rejected")),
        Err(error) => error_redirect(&base, reason_for(&error)),
    }
}

fn parse_token(query: &TokenQuery) -> Option<Uuid> {
    query.token.as_deref().and_then(|raw| raw.parse().ok())
}

fn reason_for_missing(query: &TokenQuery) -> &'static str {
    if query.token.as_deref().map_or(true, str::is_empty) {
        "missing_token"
    } else {
        "invalid_token"
    }
}

fn reason_for(error: &BookingError) -> &'static str {
    match error {
        BookingError::NotFoundOrConsumed => "invalid_token",
        BookingError::Expired => "expired",
        BookingError::Database(_) => "update_failed",
        _ => "unknown",
    }
}

/// Token links are opened in a browser, so failures land on a frontend
/// error page instead of a JSON body.
fn error_redirect(base: &str, reason: &str) -> Redirect {
    warn!(reason, "token link rejected");
    Redirect::to(&format!("{base}/book/error?reason={reason}"))
}
