mod availability_setting;
mod booking;

pub use availability_setting::AvailabilitySetting;
pub use booking::{Booking, BookingStatus, MeetingPreference, NewBooking};
