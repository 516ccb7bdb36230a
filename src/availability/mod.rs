mod aggregator;
mod slots;

pub use aggregator::{
    AvailabilityError, AvailabilityService, DayAvailability, DaySlots, WeekAvailability,
    DEFAULT_SLOT_MINUTES,
};
pub(crate) use aggregator::resolve_schedule;
pub use slots::{
    format_display_time, generate_slots, local_to_utc, BusyInterval, DaySchedule, Slot,
    BOOKING_BUFFER_MINUTES,
};
