use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Minimum gap between "now" and the earliest offered slot.
pub const BOOKING_BUFFER_MINUTES: i64 = 60;

/// A UTC time range during which no slot may be offered, regardless of
/// source (external calendar or an existing reservation). Overlapping
/// intervals from different sources are additive; nothing merges them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && self.start < end
    }
}

/// Resolved working hours for one calendar day, owner-local wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub is_active: bool,
}

/// A bookable slot: the UTC instant pair plus the start rendered in the
/// visitor's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub display_time: String,
}

/// Tiles the owner-local working window `[start_time, end_time)` with
/// fixed-size slots and drops any that overlap a busy interval or start
/// within the booking buffer. Pure function of its inputs; `now` is a
/// parameter so callers decide what the clock says.
///
/// A candidate is kept only when it fits entirely inside the window
/// (`slot.end <= window end`); a duration that does not evenly divide
/// the window silently loses the trailing remainder.
pub fn generate_slots(
    date: NaiveDate,
    schedule: &DaySchedule,
    busy: &[BusyInterval],
    owner_tz: Tz,
    visitor_tz: Tz,
    now: DateTime<Utc>,
) -> Vec<Slot> {
    if !schedule.is_active {
        return Vec::new();
    }

    let duration = Duration::minutes(i64::from(schedule.slot_duration_minutes));
    let window_start = minutes_since_midnight(schedule.start_time);
    let window_end = minutes_since_midnight(schedule.end_time);
    let min_booking_time = now + Duration::minutes(BOOKING_BUFFER_MINUTES);

    let mut slots = Vec::new();
    let mut cursor = window_start;

    while cursor + i64::from(schedule.slot_duration_minutes) <= window_end {
        let slot_local_start = time_from_minutes(cursor);
        cursor += i64::from(schedule.slot_duration_minutes);

        let Some(slot_local_start) = slot_local_start else {
            continue;
        };
        let Some(start) = local_to_utc(date, slot_local_start, owner_tz) else {
            // Wall-clock time skipped by a DST transition.
            continue;
        };
        let end = start + duration;

        if start <= min_booking_time {
            continue;
        }
        if busy.iter().any(|b| b.overlaps(start, end)) {
            continue;
        }

        slots.push(Slot {
            start,
            end,
            display_time: format_display_time(start, visitor_tz),
        });
    }

    slots
}

/// Resolves an owner-local wall-clock instant to UTC. DST-ambiguous
/// times take the earlier offset; times inside a DST gap resolve to
/// `None`.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Renders a UTC instant as e.g. "9:00 AM" in the given zone.
pub fn format_display_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%-I:%M %p").to_string()
}

fn minutes_since_midnight(time: NaiveTime) -> i64 {
    use chrono::Timelike;
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

fn time_from_minutes(minutes: i64) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::{Chicago, New_York};

    fn schedule(start: &str, end: &str, minutes: u32) -> DaySchedule {
        DaySchedule {
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            slot_duration_minutes: minutes,
            is_active: true,
        }
    }

    fn day() -> NaiveDate {
        // A Wednesday with no DST transition nearby.
        NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()
    }

    fn long_ago() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn owner_busy(date: NaiveDate, start: &str, end: &str) -> BusyInterval {
        BusyInterval {
            start: local_to_utc(date, NaiveTime::parse_from_str(start, "%H:%M").unwrap(), New_York)
                .unwrap(),
            end: local_to_utc(date, NaiveTime::parse_from_str(end, "%H:%M").unwrap(), New_York)
                .unwrap(),
        }
    }

    #[test]
    fn inactive_schedule_yields_nothing() {
        let mut sched = schedule("09:00", "17:00", 30);
        sched.is_active = false;

        let slots = generate_slots(day(), &sched, &[], New_York, New_York, long_ago());
        assert!(slots.is_empty());
    }

    #[test]
    fn full_day_tiling_fills_the_window_exactly() {
        let sched = schedule("09:00", "17:00", 30);
        let slots = generate_slots(day(), &sched, &[], New_York, New_York, long_ago());

        assert_eq!(slots.len(), 16);

        let window_start = local_to_utc(day(), sched.start_time, New_York).unwrap();
        let window_end = local_to_utc(day(), sched.end_time, New_York).unwrap();
        assert_eq!(slots.first().unwrap().start, window_start);
        assert_eq!(slots.last().unwrap().end, window_end);

        for slot in &slots {
            assert_eq!(slot.end - slot.start, Duration::minutes(30));
            assert!(slot.start >= window_start);
            assert!(slot.end <= window_end);
        }
        for pair in slots.windows(2) {
            assert!(pair[0].end <= pair[1].start, "slots must not overlap");
        }
    }

    #[test]
    fn busy_interval_removes_covered_slots() {
        let sched = schedule("09:00", "17:00", 30);
        let busy = vec![owner_busy(day(), "12:00", "13:00")];

        let slots = generate_slots(day(), &sched, &busy, New_York, New_York, long_ago());

        assert_eq!(slots.len(), 14);
        for slot in &slots {
            assert!(!busy[0].overlaps(slot.start, slot.end));
        }
    }

    #[test]
    fn busy_interval_spanning_the_window_empties_the_day() {
        let sched = schedule("09:00", "17:00", 30);
        let busy = vec![owner_busy(day(), "08:00", "18:00")];

        let slots = generate_slots(day(), &sched, &busy, New_York, New_York, long_ago());
        assert!(slots.is_empty());
    }

    #[test]
    fn partial_overlap_removes_the_touched_slot_only() {
        let sched = schedule("09:00", "17:00", 30);
        // 12:15-12:20 touches only the 12:00-12:30 slot.
        let busy = vec![owner_busy(day(), "12:15", "12:20")];

        let slots = generate_slots(day(), &sched, &busy, New_York, New_York, long_ago());
        assert_eq!(slots.len(), 15);
    }

    #[test]
    fn zero_width_window_yields_nothing() {
        let sched = schedule("09:00", "09:00", 30);
        let slots = generate_slots(day(), &sched, &[], New_York, New_York, long_ago());
        assert!(slots.is_empty());
    }

    #[test]
    fn trailing_remainder_is_dropped() {
        // 09:00-10:15 with 30-minute slots: 09:00 and 09:30 fit, the
        // 10:00-10:30 candidate overflows the window.
        let sched = schedule("09:00", "10:15", 30);
        let slots = generate_slots(day(), &sched, &[], New_York, New_York, long_ago());
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn slots_inside_the_buffer_are_dropped() {
        let sched = schedule("09:00", "17:00", 30);
        // Now = 11:30 owner-local; buffer pushes the floor to 12:30, and
        // a slot must start strictly after it, so 13:00 is the first.
        let now =
            local_to_utc(day(), NaiveTime::from_hms_opt(11, 30, 0).unwrap(), New_York).unwrap();

        let slots = generate_slots(day(), &sched, &[], New_York, New_York, now);

        let first = local_to_utc(day(), NaiveTime::from_hms_opt(13, 0, 0).unwrap(), New_York)
            .unwrap();
        assert_eq!(slots.first().unwrap().start, first);
        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn display_time_is_rendered_in_the_visitor_zone() {
        let sched = schedule("09:00", "10:00", 30);
        let slots = generate_slots(day(), &sched, &[], New_York, Chicago, long_ago());

        // 9:00 AM Eastern is 8:00 AM Central.
        assert_eq!(slots[0].display_time, "8:00 AM");
        assert_eq!(slots[1].display_time, "8:30 AM");
    }

    #[test]
    fn slot_starts_round_trip_into_the_working_window() {
        use chrono::Timelike;

        let sched = schedule("09:00", "17:00", 30);
        let slots = generate_slots(day(), &sched, &[], New_York, New_York, long_ago());

        for slot in slots {
            let local = slot.start.with_timezone(&New_York).time();
            assert!(local >= sched.start_time && local < sched.end_time);
            assert_eq!(local.second(), 0);
        }
    }
}
