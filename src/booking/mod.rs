mod lifecycle;
mod request;

pub use lifecycle::{BookingError, BookingLifecycle, CreateOutcome, VERIFICATION_TTL_HOURS};
pub use request::BookingRequest;
