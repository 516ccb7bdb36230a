use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::availability::{local_to_utc, resolve_schedule, DEFAULT_SLOT_MINUTES};
use crate::db::{Booking, BookingStore, DatabaseError, MeetingPreference, NewBooking};
use crate::gateway::{
    CalendarGateway, CaptchaVerifier, EventInput, NotificationDispatcher, RateLimiter,
};

use super::request::BookingRequest;

/// How long a verification link stays usable.
pub const VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("captcha verification failed")]
    CaptchaFailed,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("token invalid or already used")]
    NotFoundOrConsumed,
    #[error("verification link expired")]
    Expired,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of a create attempt that did not error. The feigned variant
/// reads as success to the caller but persisted nothing.
#[derive(Debug)]
pub enum CreateOutcome {
    Created { booking_id: Uuid },
    FeignedSuccess,
}

/// Drives the reservation state machine: create, verify, approve,
/// reject. Transitions are single conditional updates in the store;
/// notifications and calendar writes are best effort and never block
/// or roll back a transition.
pub struct BookingLifecycle {
    store: Arc<dyn BookingStore>,
    calendar: Arc<dyn CalendarGateway>,
    mailer: Arc<dyn NotificationDispatcher>,
    captcha: Arc<dyn CaptchaVerifier>,
    email_limiter: Arc<dyn RateLimiter>,
    owner_tz: Tz,
    public_url: String,
}

impl BookingLifecycle {
    pub fn new(
        store: Arc<dyn BookingStore>,
        calendar: Arc<dyn CalendarGateway>,
        mailer: Arc<dyn NotificationDispatcher>,
        captcha: Arc<dyn CaptchaVerifier>,
        email_limiter: Arc<dyn RateLimiter>,
        owner_tz: Tz,
        public_url: String,
    ) -> Self {
        Self {
            store,
            calendar,
            mailer,
            captcha,
            email_limiter,
            owner_tz,
            public_url,
        }
    }

    /// Creates a reservation in `pending_verification` and emails the
    /// booker a verification link. The requested time is interpreted in
    /// the booker's own zone; the slot length comes from the owner's
    /// schedule for that day.
    pub async fn create(&self, request: BookingRequest) -> Result<CreateOutcome, BookingError> {
        let requested = request
            .validate_shape()
            .map_err(BookingError::Validation)?;

        if request.honeypot_triggered() {
            info!(email = %request.email, "honeypot field filled, feigning success");
            return Ok(CreateOutcome::FeignedSuccess);
        }

        if !self.captcha.verify(&request.turnstile_token).await {
            return Err(BookingError::CaptchaFailed);
        }

        let email = request.normalized_email();
        if !self.email_limiter.check_and_consume(&email).await {
            return Err(BookingError::RateLimited);
        }

        let Some(start_time) = local_to_utc(requested.date, requested.time, requested.timezone)
        else {
            // Requested wall-clock time falls in a DST gap.
            let mut errors = ValidationErrors::new();
            let mut error = ValidationError::new("nonexistent");
            error.message = Some(Cow::Borrowed(
                "That time does not exist in the selected timezone",
            ));
            errors.add("startTime", error);
            return Err(BookingError::Validation(errors));
        };

        let duration_minutes = self.slot_duration_for(start_time).await?;
        let verification_token = Uuid::new_v4();

        let booking = self
            .store
            .insert_booking(NewBooking {
                guest_name: request.name.trim().to_string(),
                guest_email: email,
                topic: request.topic.trim().to_string(),
                notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
                start_time,
                end_time: start_time + Duration::minutes(i64::from(duration_minutes)),
                booker_timezone: requested.timezone.name().to_string(),
                meeting_preference: request.meeting_preference,
                custom_meeting_link: request.custom_meeting_link.clone(),
                phone_number: request.phone_number.clone(),
                verification_token,
                verification_expires_at: Utc::now() + Duration::hours(VERIFICATION_TTL_HOURS),
                approval_token: Uuid::new_v4(),
            })
            .await?;

        let verify_url = format!(
            "{}/bookings/verify?token={verification_token}",
            self.public_url
        );
        if let Err(error) = self
            .mailer
            .send_verification(&booking.guest_email, &booking.guest_name, &verify_url)
            .await
        {
            warn!(%error, booking_id = %booking.id, "verification email failed");
        }

        info!(booking_id = %booking.id, start = %booking.start_time, "reservation created");
        Ok(CreateOutcome::Created {
            booking_id: booking.id,
        })
    }

    /// Consumes a verification token: `pending_verification` becomes
    /// `pending_approval` and the owner is notified with approve and
    /// reject links. An expired link leaves the reservation untouched.
    pub async fn verify(&self, token: Uuid) -> Result<Booking, BookingError> {
        let pending = self
            .store
            .find_by_verification_token(token)
            .await?
            .ok_or(BookingError::NotFoundOrConsumed)?;

        if matches!(pending.verification_expires_at, Some(at) if at < Utc::now()) {
            return Err(BookingError::Expired);
        }

        let booking = self
            .store
            .consume_verification(token)
            .await?
            .ok_or(BookingError::NotFoundOrConsumed)?;

        let when = booking
            .start_time
            .with_timezone(&self.owner_tz)
            .format("%A, %B %-d, %Y at %-I:%M %p")
            .to_string();
        let approve_url = format!(
            "{}/bookings/approve?token={}",
            self.public_url, booking.approval_token
        );
        let reject_url = format!(
            "{}/bookings/reject?token={}",
            self.public_url, booking.approval_token
        );
        if let Err(error) = self
            .mailer
            .send_owner_notification(&booking, &when, &approve_url, &reject_url)
            .await
        {
            warn!(%error, booking_id = %booking.id, "owner notification failed");
        }

        info!(booking_id = %booking.id, "reservation verified");
        Ok(booking)
    }

    /// Consumes an approval token: `pending_approval` becomes
    /// `approved`. The calendar event is created first so its id lands
    /// in the same update; a calendar failure still approves.
    pub async fn approve(&self, token: Uuid) -> Result<Booking, BookingError> {
        let pending = self
            .store
            .find_by_approval_token(token)
            .await?
            .ok_or(BookingError::NotFoundOrConsumed)?;

        let event_id = match self.calendar.create_event(&event_input(&pending)).await {
            Ok(created) => Some(created.id),
            Err(error) => {
                warn!(%error, booking_id = %pending.id, "calendar event creation failed");
                None
            }
        };

        let booking = self
            .store
            .consume_approval(token, event_id.as_deref())
            .await?
            .ok_or(BookingError::NotFoundOrConsumed)?;

        info!(booking_id = %booking.id, has_event = event_id.is_some(), "reservation approved");
        Ok(booking)
    }

    /// Consumes an approval token the other way: `pending_approval`
    /// becomes `rejected` and the booker is told.
    pub async fn reject(&self, token: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .store
            .consume_rejection(token)
            .await?
            .ok_or(BookingError::NotFoundOrConsumed)?;

        if let Err(error) = self
            .mailer
            .send_rejection(&booking.guest_email, &booking.guest_name, &booking.topic)
            .await
        {
            warn!(%error, booking_id = %booking.id, "rejection email failed");
        }

        info!(booking_id = %booking.id, "reservation rejected");
        Ok(booking)
    }

    /// Slot length for the owner-local day the reservation starts on.
    async fn slot_duration_for(&self, start: DateTime<Utc>) -> Result<u32, BookingError> {
        let day_of_week = start
            .with_timezone(&self.owner_tz)
            .weekday()
            .num_days_from_sunday() as i16;
        let stored = self.store.setting_for_day(day_of_week).await?;
        Ok(resolve_schedule(day_of_week, stored)
            .map(|schedule| schedule.slot_duration_minutes)
            .unwrap_or(DEFAULT_SLOT_MINUTES))
    }
}

fn event_input(booking: &Booking) -> EventInput {
    EventInput {
        summary: format!("Meeting with {}: {}", booking.guest_name, booking.topic),
        start: booking.start_time,
        end: booking.end_time,
        attendee_email: booking.guest_email.clone(),
        conferencing: booking.meeting_preference == MeetingPreference::GoogleMeet,
        description: event_description(booking),
    }
}

fn event_description(booking: &Booking) -> Option<String> {
    let mut lines = Vec::new();
    match booking.meeting_preference {
        MeetingPreference::CustomLink => {
            if let Some(link) = &booking.custom_meeting_link {
                lines.push(format!("Meeting link: {link}"));
            }
        }
        MeetingPreference::Phone => {
            if let Some(phone) = &booking.phone_number {
                lines.push(format!("Phone: {phone}"));
            }
        }
        MeetingPreference::GoogleMeet => {}
    }
    if let Some(notes) = &booking.notes {
        lines.push(format!("Notes: {notes}"));
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
