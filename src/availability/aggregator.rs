use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::slots::{generate_slots, local_to_utc, BusyInterval, DaySchedule, Slot};
use crate::db::{AvailabilitySetting, BookingStore, DatabaseError};
use crate::gateway::CalendarGateway;

/// Furthest single day a visitor may browse.
pub const MAX_DAYS_AHEAD: i64 = 60;
/// Furthest week a visitor may browse.
pub const MAX_WEEKS_AHEAD: i64 = 10;
/// Bookings must start at least this many business days out.
pub const LEAD_BUSINESS_DAYS: u32 = 2;
/// Slot length when no stored setting overrides it.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

const DEFAULT_DAY_START: NaiveTime = match NaiveTime::from_hms_opt(9, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};
const DEFAULT_DAY_END: NaiveTime = match NaiveTime::from_hms_opt(20, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Cannot view availability that far in advance")]
    HorizonExceeded,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Single-day result: either bookable slots or an empty list with a
/// human-readable explanation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlots {
    pub slots: Vec<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DaySlots {
    fn unavailable(message: &str) -> Self {
        Self {
            slots: Vec::new(),
            message: Some(message.to_string()),
        }
    }
}

/// One weekday of the week view: the schedule plus the raw busy
/// intervals, so a client can render a live grid and compute hover
/// slots without another round trip.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: String,
    pub day_of_week: u8,
    pub available: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub slot_duration_minutes: u32,
    pub busy_slots: Vec<BusyInterval>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekAvailability {
    pub week_start: String,
    pub days: Vec<DayAvailability>,
    pub owner_timezone: String,
    pub visitor_timezone: String,
    pub slot_duration_minutes: u32,
}

/// Merges stored working hours, the external calendar's busy times and
/// existing reservations into bookable slots. Window boundaries are
/// owner-local; a visitor-local midnight would misalign the grid.
pub struct AvailabilityService {
    store: Arc<dyn BookingStore>,
    calendar: Arc<dyn CalendarGateway>,
    owner_tz: Tz,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        calendar: Arc<dyn CalendarGateway>,
        owner_tz: Tz,
    ) -> Self {
        Self {
            store,
            calendar,
            owner_tz,
        }
    }

    pub async fn day_availability(
        &self,
        date: NaiveDate,
        visitor_tz: Tz,
    ) -> Result<DaySlots, AvailabilityError> {
        let now = Utc::now();
        let today = now.with_timezone(&self.owner_tz).date_naive();

        if date > today + Duration::days(MAX_DAYS_AHEAD) {
            return Ok(DaySlots::unavailable(&format!(
                "Cannot book more than {MAX_DAYS_AHEAD} days in advance"
            )));
        }
        if date < today {
            return Ok(DaySlots::unavailable("Cannot book dates in the past"));
        }

        let day_of_week = date.weekday().num_days_from_sunday() as i16;
        let stored = self.store.setting_for_day(day_of_week).await?;
        let Some(schedule) = resolve_schedule(day_of_week, stored) else {
            return Ok(DaySlots::unavailable("Not available on this day"));
        };

        let day_start = self.owner_midnight(date);
        let day_end = self.owner_midnight(date + Duration::days(1));
        let mut busy = self.calendar_busy(day_start, day_end).await;
        busy.extend(self.store.blocking_intervals(day_start, day_end).await?);

        // The lead-time floor folds in as one more busy interval.
        let earliest = self.earliest_bookable(now);
        if day_start < earliest {
            busy.push(BusyInterval {
                start: day_start,
                end: earliest.min(day_end),
            });
        }

        let slots = generate_slots(date, &schedule, &busy, self.owner_tz, visitor_tz, now);
        Ok(DaySlots {
            slots,
            message: None,
        })
    }

    pub async fn week_availability(
        &self,
        start: NaiveDate,
        visitor_tz: Tz,
    ) -> Result<WeekAvailability, AvailabilityError> {
        let now = Utc::now();
        let today = now.with_timezone(&self.owner_tz).date_naive();
        let monday = start.week(Weekday::Mon).first_day();

        if monday > today + Duration::weeks(MAX_WEEKS_AHEAD) {
            return Err(AvailabilityError::HorizonExceeded);
        }

        // Monday 00:00 through Saturday 00:00 owner-local covers the
        // Mon-Fri working week.
        let week_start_utc = self.owner_midnight(monday);
        let week_end_utc = self.owner_midnight(monday + Duration::days(5));
        let mut busy = self.calendar_busy(week_start_utc, week_end_utc).await;
        busy.extend(
            self.store
                .blocking_intervals(week_start_utc, week_end_utc)
                .await?,
        );

        let earliest = self.earliest_bookable(now);
        let mut days = Vec::with_capacity(5);

        for offset in 0..5 {
            let date = monday + Duration::days(offset);
            let day_of_week = date.weekday().num_days_from_sunday() as i16;
            let stored = self.store.setting_for_day(day_of_week).await?;
            let schedule = resolve_schedule(day_of_week, stored);

            let day_start = self.owner_midnight(date);
            let day_end = self.owner_midnight(date + Duration::days(1));
            let mut day_busy: Vec<BusyInterval> = busy
                .iter()
                .filter(|b| b.overlaps(day_start, day_end))
                .cloned()
                .collect();

            let (available, start_time, end_time, slot_duration_minutes) = match &schedule {
                Some(s) if s.is_active => {
                    // Synthetic interval covering the lead-time gap, so
                    // the client's grid shows "too soon" time as busy.
                    if let (Some(window_start), Some(window_end)) = (
                        local_to_utc(date, s.start_time, self.owner_tz),
                        local_to_utc(date, s.end_time, self.owner_tz),
                    ) {
                        if window_start < earliest {
                            day_busy.push(BusyInterval {
                                start: window_start,
                                end: earliest.min(window_end),
                            });
                        }
                    }
                    (
                        true,
                        Some(s.start_time.format("%H:%M").to_string()),
                        Some(s.end_time.format("%H:%M").to_string()),
                        s.slot_duration_minutes,
                    )
                }
                _ => (false, None, None, DEFAULT_SLOT_MINUTES),
            };

            days.push(DayAvailability {
                date: date.format("%Y-%m-%d").to_string(),
                day_of_week: day_of_week as u8,
                available,
                start_time,
                end_time,
                slot_duration_minutes,
                busy_slots: day_busy,
            });
        }

        Ok(WeekAvailability {
            week_start: monday.format("%Y-%m-%d").to_string(),
            days,
            owner_timezone: self.owner_tz.name().to_string(),
            visitor_timezone: visitor_tz.name().to_string(),
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
        })
    }

    /// Earliest bookable instant: owner-local midnight after the
    /// lead-time floor of business days.
    fn earliest_bookable(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.owner_tz).date_naive();
        self.owner_midnight(add_business_days(today, LEAD_BUSINESS_DAYS))
    }

    /// Calendar degradation policy: on gateway failure availability
    /// falls back to settings-only rather than failing the request.
    async fn calendar_busy(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<BusyInterval> {
        match self.calendar.query_free_busy(from, to).await {
            Ok(busy) => busy,
            Err(e) => {
                warn!("calendar free/busy query failed, proceeding without calendar data: {e}");
                Vec::new()
            }
        }
    }

    fn owner_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.owner_tz.from_local_datetime(&naive).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            // Midnight fell in a DST gap; the next hour exists.
            None => self
                .owner_tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}

/// Stored settings win outright, including inactive ones; an absent row
/// falls back to the weekday default, and weekends without a row are
/// unavailable.
pub(crate) fn resolve_schedule(
    day_of_week: i16,
    stored: Option<AvailabilitySetting>,
) -> Option<DaySchedule> {
    match stored {
        Some(setting) => Some(DaySchedule {
            start_time: setting.start_time,
            end_time: setting.end_time,
            slot_duration_minutes: setting.slot_duration_minutes.max(1) as u32,
            is_active: setting.is_active,
        }),
        None if (1..=5).contains(&day_of_week) => Some(DaySchedule {
            start_time: DEFAULT_DAY_START,
            end_time: DEFAULT_DAY_END,
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
            is_active: true,
        }),
        None => None,
    }
}

pub(crate) fn add_business_days(mut date: NaiveDate, days: u32) -> NaiveDate {
    for _ in 0..days {
        date += Duration::days(1);
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += Duration::days(1);
        }
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono_tz::America::New_York;
    use std::collections::HashMap;
    use uuid::Uuid;

    use crate::db::{Booking, NewBooking};
    use crate::gateway::{CreatedEvent, EventInput, GatewayError};

    struct FakeStore {
        settings: HashMap<i16, AvailabilitySetting>,
        reservations: Vec<BusyInterval>,
    }

    impl FakeStore {
        fn empty() -> Self {
            Self {
                settings: HashMap::new(),
                reservations: Vec::new(),
            }
        }

        fn with_setting(mut self, setting: AvailabilitySetting) -> Self {
            self.settings.insert(setting.day_of_week, setting);
            self
        }

        fn with_reservation(mut self, interval: BusyInterval) -> Self {
            self.reservations.push(interval);
            self
        }
    }

    #[async_trait]
    impl BookingStore for FakeStore {
        async fn ping(&self) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn setting_for_day(
            &self,
            day_of_week: i16,
        ) -> Result<Option<AvailabilitySetting>, DatabaseError> {
            Ok(self.settings.get(&day_of_week).cloned())
        }

        async fn insert_booking(&self, _new: NewBooking) -> Result<Booking, DatabaseError> {
            unimplemented!("not used by availability tests")
        }

        async fn blocking_intervals(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<BusyInterval>, DatabaseError> {
            Ok(self
                .reservations
                .iter()
                .filter(|r| r.start >= from && r.start <= to)
                .cloned()
                .collect())
        }

        async fn find_by_verification_token(
            &self,
            _token: Uuid,
        ) -> Result<Option<Booking>, DatabaseError> {
            unimplemented!("not used by availability tests")
        }

        async fn find_by_approval_token(
            &self,
            _token: Uuid,
        ) -> Result<Option<Booking>, DatabaseError> {
            unimplemented!("not used by availability tests")
        }

        async fn consume_verification(
            &self,
            _token: Uuid,
        ) -> Result<Option<Booking>, DatabaseError> {
            unimplemented!("not used by availability tests")
        }

        async fn consume_approval(
            &self,
            _token: Uuid,
            _calendar_event_id: Option<&str>,
        ) -> Result<Option<Booking>, DatabaseError> {
            unimplemented!("not used by availability tests")
        }

        async fn consume_rejection(&self, _token: Uuid) -> Result<Option<Booking>, DatabaseError> {
            unimplemented!("not used by availability tests")
        }
    }

    struct FakeCalendar {
        busy: Vec<BusyInterval>,
        failing: bool,
    }

    #[async_trait]
    impl CalendarGateway for FakeCalendar {
        async fn query_free_busy(
            &self,
            _time_min: DateTime<Utc>,
            _time_max: DateTime<Utc>,
        ) -> Result<Vec<BusyInterval>, GatewayError> {
            if self.failing {
                Err(GatewayError::Api("boom".to_string()))
            } else {
                Ok(self.busy.clone())
            }
        }

        async fn create_event(&self, _input: &EventInput) -> Result<CreatedEvent, GatewayError> {
            unimplemented!("not used by availability tests")
        }
    }

    fn setting(day_of_week: i16, start: &str, end: &str, active: bool) -> AvailabilitySetting {
        AvailabilitySetting {
            id: Uuid::new_v4(),
            day_of_week,
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            slot_duration_minutes: 30,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(store: FakeStore, calendar: FakeCalendar) -> AvailabilityService {
        AvailabilityService::new(Arc::new(store), Arc::new(calendar), New_York)
    }

    fn quiet_calendar() -> FakeCalendar {
        FakeCalendar {
            busy: Vec::new(),
            failing: false,
        }
    }

    /// A weekday far enough out to clear the lead-time floor but inside
    /// the browse horizon.
    fn far_weekday() -> NaiveDate {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let mut date = today + Duration::days(30);
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += Duration::days(1);
        }
        date
    }

    fn owner_instant(date: NaiveDate, time: &str) -> DateTime<Utc> {
        local_to_utc(
            date,
            NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            New_York,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn stored_setting_shapes_the_day() {
        let date = far_weekday();
        let dow = date.weekday().num_days_from_sunday() as i16;
        let svc = service(
            FakeStore::empty().with_setting(setting(dow, "09:00", "17:00", true)),
            quiet_calendar(),
        );

        let day = svc.day_availability(date, New_York).await.unwrap();
        assert_eq!(day.slots.len(), 16);
        assert!(day.message.is_none());
    }

    #[tokio::test]
    async fn weekday_without_a_row_uses_the_default_window() {
        let date = far_weekday();
        let svc = service(FakeStore::empty(), quiet_calendar());

        let day = svc.day_availability(date, New_York).await.unwrap();
        // 09:00-20:00 tiled by 30 minutes.
        assert_eq!(day.slots.len(), 22);
    }

    #[tokio::test]
    async fn weekend_without_a_row_is_unavailable() {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let mut date = today + Duration::days(21);
        while date.weekday() != Weekday::Sat {
            date += Duration::days(1);
        }
        let svc = service(FakeStore::empty(), quiet_calendar());

        let day = svc.day_availability(date, New_York).await.unwrap();
        assert!(day.slots.is_empty());
        assert_eq!(day.message.as_deref(), Some("Not available on this day"));
    }

    #[tokio::test]
    async fn inactive_stored_row_blocks_the_default_fallback() {
        let date = far_weekday();
        let dow = date.weekday().num_days_from_sunday() as i16;
        let svc = service(
            FakeStore::empty().with_setting(setting(dow, "09:00", "17:00", false)),
            quiet_calendar(),
        );

        let day = svc.day_availability(date, New_York).await.unwrap();
        assert!(day.slots.is_empty());
    }

    #[tokio::test]
    async fn reservations_and_calendar_busy_are_additive() {
        let date = far_weekday();
        let dow = date.weekday().num_days_from_sunday() as i16;
        let svc = service(
            FakeStore::empty()
                .with_setting(setting(dow, "09:00", "17:00", true))
                .with_reservation(BusyInterval {
                    start: owner_instant(date, "10:00"),
                    end: owner_instant(date, "10:30"),
                }),
            FakeCalendar {
                busy: vec![BusyInterval {
                    start: owner_instant(date, "12:00"),
                    end: owner_instant(date, "13:00"),
                }],
                failing: false,
            },
        );

        let day = svc.day_availability(date, New_York).await.unwrap();
        // 16 minus one reserved slot and two calendar-busy slots.
        assert_eq!(day.slots.len(), 13);
    }

    #[tokio::test]
    async fn calendar_failure_degrades_to_settings_only() {
        let date = far_weekday();
        let dow = date.weekday().num_days_from_sunday() as i16;
        let svc = service(
            FakeStore::empty().with_setting(setting(dow, "09:00", "17:00", true)),
            FakeCalendar {
                busy: Vec::new(),
                failing: true,
            },
        );

        let day = svc.day_availability(date, New_York).await.unwrap();
        assert_eq!(day.slots.len(), 16);
    }

    #[tokio::test]
    async fn past_and_far_future_dates_carry_messages() {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let svc = service(FakeStore::empty(), quiet_calendar());

        let past = svc
            .day_availability(today - Duration::days(1), New_York)
            .await
            .unwrap();
        assert_eq!(past.message.as_deref(), Some("Cannot book dates in the past"));

        let far = svc
            .day_availability(today + Duration::days(MAX_DAYS_AHEAD + 1), New_York)
            .await
            .unwrap();
        assert!(far.slots.is_empty());
        assert!(far.message.is_some());
    }

    #[tokio::test]
    async fn lead_time_floor_empties_the_next_business_day() {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let tomorrow = add_business_days(today, 1);
        let dow = tomorrow.weekday().num_days_from_sunday() as i16;
        let svc = service(
            FakeStore::empty().with_setting(setting(dow, "09:00", "17:00", true)),
            quiet_calendar(),
        );

        let day = svc.day_availability(tomorrow, New_York).await.unwrap();
        assert!(day.slots.is_empty());
    }

    #[tokio::test]
    async fn week_view_reports_five_weekdays() {
        let start = far_weekday();
        let svc = service(FakeStore::empty(), quiet_calendar());

        let week = svc.week_availability(start, New_York).await.unwrap();
        assert_eq!(week.days.len(), 5);
        assert_eq!(
            week.days.iter().map(|d| d.day_of_week).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        for day in &week.days {
            assert!(day.available);
            assert_eq!(day.start_time.as_deref(), Some("09:00"));
            assert_eq!(day.end_time.as_deref(), Some("20:00"));
        }
    }

    #[tokio::test]
    async fn week_view_injects_a_synthetic_too_soon_interval() {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let tomorrow = add_business_days(today, 1);
        let svc = service(FakeStore::empty(), quiet_calendar());

        let week = svc.week_availability(tomorrow, New_York).await.unwrap();
        let day = week
            .days
            .iter()
            .find(|d| d.date == tomorrow.format("%Y-%m-%d").to_string())
            .unwrap();

        // Tomorrow is inside the lead-time gap, so its whole working
        // window must be reported busy.
        let window_start = owner_instant(tomorrow, "09:00");
        let window_end = owner_instant(tomorrow, "20:00");
        assert!(day
            .busy_slots
            .iter()
            .any(|b| b.start <= window_start && b.end >= window_end));
    }

    #[tokio::test]
    async fn week_view_rejects_starts_beyond_the_horizon() {
        let today = Utc::now().with_timezone(&New_York).date_naive();
        let svc = service(FakeStore::empty(), quiet_calendar());

        let err = svc
            .week_availability(today + Duration::weeks(MAX_WEEKS_AHEAD + 1), New_York)
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::HorizonExceeded));
    }

    #[test]
    fn business_day_arithmetic_skips_weekends() {
        // Friday 2025-06-13 + 2 business days = Tuesday 2025-06-17.
        let friday = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        assert_eq!(
            add_business_days(friday, 2),
            NaiveDate::from_ymd_opt(2025, 6, 17).unwrap()
        );

        // Wednesday + 2 business days = Friday.
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        assert_eq!(
            add_business_days(wednesday, 2),
            NaiveDate::from_ymd_opt(2025, 6, 13).unwrap()
        );
    }
}
