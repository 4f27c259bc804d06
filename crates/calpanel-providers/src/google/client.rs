//! Google Calendar API client.
//!
//! A thin HTTP client for the events list endpoint. Retry and link handling
//! live in [`crate::fetcher`]; this client classifies each response once.

use serde::Deserialize;
use tracing::{debug, warn};

use calpanel_core::{CalendarEvent, EventTime, UNTITLED_EVENT};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarApi, EventQuery};

use super::config::GoogleConfig;

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleCalendarClient {
    /// Creates a new Google Calendar client.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let http_client = super::build_http_client(&config)?;
        Ok(Self {
            http_client,
            config,
        })
    }

    async fn fetch_events(
        &self,
        query: &EventQuery,
        bearer: &str,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let url = self.config.events_url(&query.calendar_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(bearer)
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("calendar events", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport("calendar events", e))?;

        let events = parse_events_response(status, &body)?;
        debug!(
            calendar = %query.calendar_id,
            count = events.len(),
            "fetched events"
        );
        Ok(events)
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_events<'a>(
        &'a self,
        query: &'a EventQuery,
        bearer: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.fetch_events(query, bearer))
    }
}

/// Classifies an events list response.
///
/// - a body carrying an `error` member is an explicit API error, whatever
///   the status code
/// - any other non-success status is a server error
/// - a success body that does not parse is an invalid response
/// - a missing `items` member means no events
pub fn parse_events_response(
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderResult<Vec<CalendarEvent>> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(ProviderError::api(envelope.error.describe(status)));
    }

    if !status.is_success() {
        return Err(ProviderError::server(format!(
            "calendar API returned {} without an error payload",
            status
        )));
    }

    let list: EventListResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse events response: {}", e))
    })?;

    Ok(list.items.into_iter().filter_map(convert_event).collect())
}

/// Converts an API event, dropping cancelled events and events without a
/// usable start.
fn convert_event(event: ApiEvent) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id.as_deref().unwrap_or("<no id>");
    let start = match (event.start.date_time, event.start.date) {
        (Some(dt), _) => EventTime::parse_date_time(&dt)
            .map_err(|e| warn!(event = id, value = %dt, "failed to parse start time: {}", e))
            .ok()?,
        (None, Some(date)) => EventTime::parse_date(&date)
            .map_err(|e| warn!(event = id, value = %date, "failed to parse start date: {}", e))
            .ok()?,
        (None, None) => {
            warn!(event = id, "event has no start time, skipping");
            return None;
        }
    };

    let summary = event
        .summary
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED_EVENT.to_string());

    Some(CalendarEvent::new(summary, start))
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    status: Option<String>,
}

/// Event time from the API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

/// The `error` member: an object for API errors, a bare code elsewhere.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Detailed {
        code: Option<u16>,
        message: Option<String>,
        status: Option<String>,
    },
    Code(String),
}

impl ApiErrorBody {
    fn describe(&self, http_status: reqwest::StatusCode) -> String {
        match self {
            Self::Detailed {
                code,
                message,
                status,
            } => {
                let code = code.unwrap_or(http_status.as_u16());
                let message = message.as_deref().unwrap_or("no message");
                match status {
                    Some(status) => format!("{} {}: {}", code, status, message),
                    None => format!("{}: {}", code, message),
                }
            }
            Self::Code(code) => format!("{}: {}", http_status.as_u16(), code),
        }
    }
}
