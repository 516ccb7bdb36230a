use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::GatewayError;
use crate::config::EmailConfig;
use crate::db::Booking;

const RESEND_API: &str = "https://api.resend.com";

/// Outbound email boundary. All sends are fire-and-forget from the
/// core's perspective; a failed send never rolls back a transition.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_verification(
        &self,
        to: &str,
        name: &str,
        verify_url: &str,
    ) -> Result<(), GatewayError>;

    async fn send_owner_notification(
        &self,
        booking: &Booking,
        when: &str,
        approve_url: &str,
        reject_url: &str,
    ) -> Result<(), GatewayError>;

    async fn send_rejection(&self, to: &str, name: &str, topic: &str) -> Result<(), GatewayError>;
}

/// Resend REST client. Without an API key it logs what it would have
/// sent and reports success, so development deployments work end to end.
pub struct ResendMailer {
    http: reqwest::Client,
    config: Option<EmailConfig>,
    api_base: String,
}

impl ResendMailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_base: RESEND_API.to_string(),
        }
    }

    async fn deliver(&self, to: &str, subject: &str, html: String) -> Result<(), GatewayError> {
        let Some(config) = &self.config else {
            info!(to, subject, "email delivery disabled, skipping send");
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&config.resend_api_key)
            .json(&SendRequest {
                from: &config.from_address,
                to: vec![to],
                subject,
                html: &html,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "email send failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for ResendMailer {
    async fn send_verification(
        &self,
        to: &str,
        name: &str,
        verify_url: &str,
    ) -> Result<(), GatewayError> {
        let html = format!(
            "<p>Hi {name},</p>\
             <p>Thank you for your booking request. Please confirm your email address to \
             submit it for approval:</p>\
             <p><a href=\"{verify_url}\">Verify booking request</a></p>\
             <p>This link expires in 24 hours. If you didn't request a booking, you can \
             safely ignore this email.</p>"
        );
        self.deliver(to, "Verify your booking request", html).await
    }

    async fn send_owner_notification(
        &self,
        booking: &Booking,
        when: &str,
        approve_url: &str,
        reject_url: &str,
    ) -> Result<(), GatewayError> {
        let Some(config) = &self.config else {
            info!(booking_id = %booking.id, "email delivery disabled, skipping owner notification");
            return Ok(());
        };
        let owner = config.owner_email.clone();

        let notes = booking
            .notes
            .as_deref()
            .map(|n| format!("<p><strong>Notes:</strong> {n}</p>"))
            .unwrap_or_default();
        let html = format!(
            "<p><strong>From:</strong> {} ({})</p>\
             <p><strong>When:</strong> {}</p>\
             <p><strong>Topic:</strong> {}</p>\
             {}\
             <p><a href=\"{}\">Approve</a> &nbsp; <a href=\"{}\">Reject</a></p>\
             <p>Booking ID: {}</p>",
            booking.guest_name,
            booking.guest_email,
            when,
            booking.topic,
            notes,
            approve_url,
            reject_url,
            booking.id,
        );
        let subject = format!("New booking request from {}", booking.guest_name);
        self.deliver(&owner, &subject, html).await
    }

    async fn send_rejection(&self, to: &str, name: &str, topic: &str) -> Result<(), GatewayError> {
        let html = format!(
            "<p>Hi {name},</p>\
             <p>Unfortunately I'm unable to accommodate your booking request for \
             \"{topic}\" at this time.</p>\
             <p>Feel free to request a different time slot, or reach out directly with \
             any questions.</p>"
        );
        self.deliver(to, "Booking request update", html).await
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}
