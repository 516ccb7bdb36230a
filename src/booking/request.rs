use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::db::MeetingPreference;

/// Booking creation payload as submitted by the frontend form.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,

    #[validate(
        email(message = "Please enter a valid email address"),
        length(max = 255)
    )]
    pub email: String,

    /// `YYYY-MM-DD`.
    pub date: String,

    /// `HH:MM`, interpreted in the booker's timezone.
    pub start_time: String,

    /// IANA zone name of the booker.
    pub timezone: String,

    #[validate(length(min = 2, max = 200, message = "Please describe the meeting topic"))]
    pub topic: String,

    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,

    #[serde(default)]
    pub meeting_preference: MeetingPreference,

    #[validate(url(message = "Please enter a valid URL"))]
    pub custom_meeting_link: Option<String>,

    pub phone_number: Option<String>,

    /// Honeypot. Humans never see this field; bots auto-fill it.
    #[serde(default)]
    pub website: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Please complete the security check"))]
    pub turnstile_token: String,
}

/// Schedule fields after shape validation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestedStart {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub timezone: Tz,
}

impl BookingRequest {
    /// Full shape validation: derive rules, date/time/zone formats and
    /// the meeting-preference-conditional fields, collected into one
    /// field-keyed error set.
    pub(crate) fn validate_shape(&self) -> Result<RequestedStart, ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d");
        if date.is_err() {
            errors.add("date", field_error("format", "Invalid date format"));
        }

        let time = NaiveTime::parse_from_str(&self.start_time, "%H:%M");
        if time.is_err() {
            errors.add("startTime", field_error("format", "Invalid time format"));
        }

        let timezone = self.timezone.parse::<Tz>();
        if timezone.is_err() {
            errors.add("timezone", field_error("format", "Unknown timezone"));
        }

        match self.meeting_preference {
            MeetingPreference::CustomLink
                if self
                    .custom_meeting_link
                    .as_deref()
                    .map_or(true, str::is_empty) =>
            {
                errors.add(
                    "customMeetingLink",
                    field_error("required", "A meeting link is required"),
                );
            }
            MeetingPreference::Phone
                if self.phone_number.as_deref().map_or(true, str::is_empty) =>
            {
                errors.add(
                    "phoneNumber",
                    field_error("required", "A phone number is required"),
                );
            }
            _ => {}
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(RequestedStart {
            date: date.unwrap_or_default(),
            time: time.unwrap_or_default(),
            timezone: timezone.unwrap_or(chrono_tz::UTC),
        })
    }

    pub(crate) fn honeypot_triggered(&self) -> bool {
        !self.website.trim().is_empty()
    }

    pub(crate) fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}
