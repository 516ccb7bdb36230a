use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::GatewayError;
use crate::availability::BusyInterval;
use crate::config::GoogleConfig;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Event payload for the external calendar. Built by the lifecycle
/// manager from an approved reservation.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee_email: String,
    /// Request an auto-generated conference link (Google Meet).
    pub conferencing: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub id: String,
}

/// Thin adapter over the third-party calendar's free/busy query and
/// event creation.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn query_free_busy(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, GatewayError>;

    async fn create_event(&self, input: &EventInput) -> Result<CreatedEvent, GatewayError>;
}

/// Stand-in when no calendar credentials are configured: availability
/// falls back to stored settings alone, and event creation reports
/// itself unconfigured (approval tolerates that).
pub struct NullCalendarGateway;

#[async_trait]
impl CalendarGateway for NullCalendarGateway {
    async fn query_free_busy(
        &self,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, GatewayError> {
        Ok(Vec::new())
    }

    async fn create_event(&self, _input: &EventInput) -> Result<CreatedEvent, GatewayError> {
        Err(GatewayError::Unconfigured)
    }
}

/// Google Calendar REST client authenticated with a long-lived OAuth
/// refresh token obtained once out of band.
pub struct GoogleCalendarGateway {
    http: reqwest::Client,
    config: GoogleConfig,
    token_url: String,
    api_base: String,
}

impl GoogleCalendarGateway {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: GOOGLE_CALENDAR_API.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_urls(config: GoogleConfig, token_url: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token_url,
            api_base,
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "token refresh failed with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    fn free_busy_calendar_ids(&self) -> Vec<String> {
        if self.config.calendar_ids.is_empty() {
            vec!["primary".to_string()]
        } else {
            self.config.calendar_ids.clone()
        }
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn query_free_busy(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, GatewayError> {
        let token = self.access_token().await?;

        let request = FreeBusyRequest {
            time_min,
            time_max,
            items: self
                .free_busy_calendar_ids()
                .into_iter()
                .map(|id| FreeBusyItem { id })
                .collect(),
        };

        let response = self
            .http
            .post(format!("{}/freeBusy", self.api_base))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "freeBusy query failed with status {}",
                response.status()
            )));
        }

        let body: FreeBusyResponse = response.json().await?;

        // Union across calendars; overlaps stay as-is, the slot
        // generator treats intervals additively.
        let mut busy = Vec::new();
        for calendar in body.calendars.into_values() {
            busy.extend(calendar.busy);
        }
        Ok(busy)
    }

    async fn create_event(&self, input: &EventInput) -> Result<CreatedEvent, GatewayError> {
        let token = self.access_token().await?;

        let event = EventRequest {
            summary: input.summary.clone(),
            start: EventTime {
                date_time: input.start,
            },
            end: EventTime {
                date_time: input.end,
            },
            attendees: vec![EventAttendee {
                email: input.attendee_email.clone(),
            }],
            description: input.description.clone(),
            conference_data: input.conferencing.then(|| ConferenceData {
                create_request: ConferenceCreateRequest {
                    request_id: Uuid::new_v4().to_string(),
                    conference_solution_key: ConferenceSolutionKey {
                        key_type: "hangoutsMeet".to_string(),
                    },
                },
            }),
        };

        let conference_data_version = if input.conferencing { 1 } else { 0 };
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base, self.config.target_calendar_id
        );

        let response = self
            .http
            .post(url)
            // sendUpdates=all makes Google email the invite itself.
            .query(&[
                ("conferenceDataVersion", conference_data_version.to_string()),
                ("sendUpdates", "all".to_string()),
            ])
            .bearer_auth(&token)
            .json(&event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "event creation failed with status {}",
                response.status()
            )));
        }

        let created: EventResponse = response.json().await?;
        Ok(CreatedEvent { id: created.id })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    items: Vec<FreeBusyItem>,
}

#[derive(Serialize)]
struct FreeBusyItem {
    id: String,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    summary: String,
    start: EventTime,
    end: EventTime,
    attendees: Vec<EventAttendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conference_data: Option<ConferenceData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct EventAttendee {
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    create_request: ConferenceCreateRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceCreateRequest {
    request_id: String,
    conference_solution_key: ConferenceSolutionKey,
}

#[derive(Serialize)]
struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    key_type: String,
}

#[derive(Deserialize)]
struct EventResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
            calendar_ids: vec!["work".to_string(), "personal".to_string()],
            target_calendar_id: "primary".to_string(),
        }
    }

    async fn mock_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "abc" })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn free_busy_merges_intervals_across_calendars() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "calendars": {
                    "work": { "busy": [
                        { "start": "2025-06-11T14:00:00Z", "end": "2025-06-11T15:00:00Z" }
                    ]},
                    "personal": { "busy": [
                        { "start": "2025-06-11T16:00:00Z", "end": "2025-06-11T17:00:00Z" }
                    ]}
                }
            })))
            .mount(&server)
            .await;

        let gateway = GoogleCalendarGateway::with_base_urls(
            config(),
            format!("{}/token", server.uri()),
            server.uri(),
        );

        let from = Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 6, 12, 0, 0, 0).unwrap();
        let mut busy = gateway.query_free_busy(from, to).await.unwrap();
        busy.sort_by_key(|b| b.start);

        assert_eq!(busy.len(), 2);
        assert_eq!(
            busy[0].start,
            Utc.with_ymd_and_hms(2025, 6, 11, 14, 0, 0).unwrap()
        );
        assert_eq!(
            busy[1].end,
            Utc.with_ymd_and_hms(2025, 6, 11, 17, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn create_event_returns_the_external_id() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt_42" })))
            .mount(&server)
            .await;

        let gateway = GoogleCalendarGateway::with_base_urls(
            config(),
            format!("{}/token", server.uri()),
            server.uri(),
        );

        let input = EventInput {
            summary: "Meeting with Ada: systems chat".to_string(),
            start: Utc.with_ymd_and_hms(2025, 6, 11, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 11, 14, 30, 0).unwrap(),
            attendee_email: "ada@example.com".to_string(),
            conferencing: true,
            description: None,
        };

        let created = gateway.create_event(&input).await.unwrap();
        assert_eq!(created.id, "evt_42");
    }

    #[tokio::test]
    async fn upstream_error_status_surfaces_as_api_error() {
        let server = MockServer::start().await;
        mock_token_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = GoogleCalendarGateway::with_base_urls(
            config(),
            format!("{}/token", server.uri()),
            server.uri(),
        );

        let from = Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 6, 12, 0, 0, 0).unwrap();
        let err = gateway.query_free_busy(from, to).await.unwrap_err();
        assert!(matches!(err, GatewayError::Api(_)));
    }
}
