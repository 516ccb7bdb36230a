use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingVerification,
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "meeting_preference", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingPreference {
    GoogleMeet,
    CustomLink,
    Phone,
}

impl Default for MeetingPreference {
    fn default() -> Self {
        MeetingPreference::GoogleMeet
    }
}

/// A reservation. Owned by the store; mutated only through the
/// lifecycle manager's status-conditional transitions.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub topic: String,
    pub notes: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// IANA zone of the booker, display-only.
    pub booker_timezone: String,
    pub meeting_preference: MeetingPreference,
    pub custom_meeting_link: Option<String>,
    pub phone_number: Option<String>,
    pub status: BookingStatus,
    pub verification_token: Option<Uuid>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub approval_token: Uuid,
    pub calendar_event_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new reservation. Field validation happens
/// upstream on the request type; by the time this exists the times are
/// resolved UTC instants and both tokens are generated.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub guest_name: String,
    pub guest_email: String,
    pub topic: String,
    pub notes: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub booker_timezone: String,
    pub meeting_preference: MeetingPreference,
    pub custom_meeting_link: Option<String>,
    pub phone_number: Option<String>,
    pub verification_token: Uuid,
    pub verification_expires_at: DateTime<Utc>,
    pub approval_token: Uuid,
}
