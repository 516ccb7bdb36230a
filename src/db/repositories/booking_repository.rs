use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::availability::BusyInterval;
use crate::db::error::DatabaseError;
use crate::db::models::{AvailabilitySetting, Booking, NewBooking};
use crate::db::store::BookingStore;

const BOOKING_COLUMNS: &str = "id, guest_name, guest_email, topic, notes, start_time, end_time, \
     booker_timezone, meeting_preference, custom_meeting_link, phone_number, status, \
     verification_token, verification_expires_at, approval_token, calendar_event_id, \
     verified_at, approved_at, rejected_at, created_at, updated_at";

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn setting_for_day(
        &self,
        day_of_week: i16,
    ) -> Result<Option<AvailabilitySetting>, DatabaseError> {
        let setting = sqlx::query_as::<_, AvailabilitySetting>(
            "SELECT id, day_of_week, start_time, end_time, slot_duration_minutes, is_active, \
                    created_at, updated_at \
             FROM availability_settings \
             WHERE day_of_week = $1",
        )
        .bind(day_of_week)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, DatabaseError> {
        let query = format!(
            "INSERT INTO bookings (guest_name, guest_email, topic, notes, start_time, end_time, \
                 booker_timezone, meeting_preference, custom_meeting_link, phone_number, status, \
                 verification_token, verification_expires_at, approval_token) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending_verification', $11, $12, $13) \
             RETURNING {BOOKING_COLUMNS}"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(&new.guest_name)
            .bind(new.guest_email.to_lowercase())
            .bind(&new.topic)
            .bind(&new.notes)
            .bind(new.start_time)
            .bind(new.end_time)
            .bind(&new.booker_timezone)
            .bind(new.meeting_preference)
            .bind(&new.custom_meeting_link)
            .bind(&new.phone_number)
            .bind(new.verification_token)
            .bind(new.verification_expires_at)
            .bind(new.approval_token)
            .fetch_one(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn blocking_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, DatabaseError> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, DateTime<Utc>)>(
            "SELECT start_time, end_time \
             FROM bookings \
             WHERE start_time >= $1 AND start_time <= $2 \
               AND status = ANY(ARRAY['pending_verification', 'pending_approval', 'approved']::booking_status[]) \
             ORDER BY start_time",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(start, end)| BusyInterval { start, end })
            .collect())
    }

    async fn find_by_verification_token(
        &self,
        token: Uuid,
    ) -> Result<Option<Booking>, DatabaseError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE verification_token = $1 AND status = 'pending_verification'"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn find_by_approval_token(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE approval_token = $1 AND status = 'pending_approval'"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn consume_verification(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError> {
        // Single conditional update: two concurrent clicks race on the
        // status filter and exactly one sees a row.
        let query = format!(
            "UPDATE bookings \
             SET status = 'pending_approval', verified_at = now(), \
                 verification_token = NULL, verification_expires_at = NULL, updated_at = now() \
             WHERE verification_token = $1 AND status = 'pending_verification' \
             RETURNING {BOOKING_COLUMNS}"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn consume_approval(
        &self,
        token: Uuid,
        calendar_event_id: Option<&str>,
    ) -> Result<Option<Booking>, DatabaseError> {
        let query = format!(
            "UPDATE bookings \
             SET status = 'approved', approved_at = now(), calendar_event_id = $2, \
                 updated_at = now() \
             WHERE approval_token = $1 AND status = 'pending_approval' \
             RETURNING {BOOKING_COLUMNS}"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(token)
            .bind(calendar_event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn consume_rejection(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError> {
        let query = format!(
            "UPDATE bookings \
             SET status = 'rejected', rejected_at = now(), updated_at = now() \
             WHERE approval_token = $1 AND status = 'pending_approval' \
             RETURNING {BOOKING_COLUMNS}"
        );

        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }
}
