pub mod availability;
pub mod bookings;
