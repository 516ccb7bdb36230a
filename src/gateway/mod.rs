mod calendar;
mod email;
mod rate_limit;
mod turnstile;

pub use calendar::{
    CalendarGateway, CreatedEvent, EventInput, GoogleCalendarGateway, NullCalendarGateway,
};
pub use email::{NotificationDispatcher, ResendMailer};
pub use rate_limit::{RateLimiter, SlidingWindowLimiter};
pub use turnstile::{CaptchaVerifier, TurnstileVerifier};

use thiserror::Error;

/// Failures at an external collaborator boundary. These never abort a
/// core transition that has already committed; callers log and proceed.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream rejected the request: {0}")]
    Api(String),

    #[error("Gateway is not configured")]
    Unconfigured,
}
