use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::availability::AvailabilityError;
use crate::booking::BookingError;
use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation error")]
    Validation(ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Captcha verification failed")]
    CaptchaFailed,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Token invalid or already used")]
    NotFoundOrConsumed,

    #[error("Link expired")]
    Expired,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Validation is the one variant that carries field-level detail
        // back to the form.
        if let AppError::Validation(errors) = &self {
            let body = Json(json!({
                "error": {
                    "message": "Validation error",
                    "details": errors,
                }
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_message) = match &self {
            AppError::Database(_) | AppError::Validation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred",
            ),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.as_str()),
            AppError::CaptchaFailed => (
                StatusCode::BAD_REQUEST,
                "Security verification failed. Please try again.",
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many booking requests. Please try again tomorrow.",
            ),
            AppError::NotFoundOrConsumed => (
                StatusCode::NOT_FOUND,
                "This link is invalid or has already been used",
            ),
            AppError::Expired => (StatusCode::GONE, "This link has expired"),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        match error {
            BookingError::Validation(errors) => AppError::Validation(errors),
            BookingError::CaptchaFailed => AppError::CaptchaFailed,
            BookingError::RateLimited => AppError::RateLimited,
            BookingError::NotFoundOrConsumed => AppError::NotFoundOrConsumed,
            BookingError::Expired => AppError::Expired,
            BookingError::Database(error) => AppError::Database(error),
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::HorizonExceeded => {
                AppError::BadRequest("Cannot view availability that far in advance".to_string())
            }
            AvailabilityError::Database(error) => AppError::Database(error),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
