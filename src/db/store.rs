use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::DatabaseError;
use super::models::{AvailabilitySetting, Booking, NewBooking};
use crate::availability::BusyInterval;

/// Persistence boundary for reservations and availability settings.
///
/// Every token-consuming method is a conditional update filtered on the
/// expected current status; `None` means no row matched, which covers
/// both "never existed" and "already consumed" without distinction.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn setting_for_day(
        &self,
        day_of_week: i16,
    ) -> Result<Option<AvailabilitySetting>, DatabaseError>;

    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, DatabaseError>;

    /// `[start_time, end_time)` pairs of reservations that block slots
    /// (pending_verification, pending_approval, approved) whose start
    /// falls within `[from, to]`.
    async fn blocking_intervals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, DatabaseError>;

    /// Plain read, used for the expiry check before consumption.
    async fn find_by_verification_token(
        &self,
        token: Uuid,
    ) -> Result<Option<Booking>, DatabaseError>;

    /// Plain read of a reservation awaiting approval, used to build the
    /// calendar event before the consuming update.
    async fn find_by_approval_token(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError>;

    /// pending_verification -> pending_approval; clears both
    /// verification fields and stamps `verified_at`.
    async fn consume_verification(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError>;

    /// pending_approval -> approved; stamps `approved_at` and the
    /// external event id when one was obtained.
    async fn consume_approval(
        &self,
        token: Uuid,
        calendar_event_id: Option<&str>,
    ) -> Result<Option<Booking>, DatabaseError>;

    /// pending_approval -> rejected; stamps `rejected_at`.
    async fn consume_rejection(&self, token: Uuid) -> Result<Option<Booking>, DatabaseError>;
}
