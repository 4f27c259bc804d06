//! Remote service traits.
//!
//! The sync loop talks to three services: the calendar events API, the OAuth2
//! token endpoint and a network time service. Each one sits behind a trait so
//! tests can substitute fakes and the HTTP clients in [`crate::google`] and
//! [`crate::timeapi`] stay thin.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, SecondsFormat, Utc};
use calpanel_core::{CalendarEvent, TimeWindow};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so the scheduler can hold
/// `Arc<dyn CalendarApi>` and friends.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parameters of one events query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Calendar identifier, usually an email address.
    pub calendar_id: String,
    /// Lower bound (inclusive) on event end time.
    pub time_min: DateTime<Utc>,
    /// Upper bound (exclusive) on event start time.
    pub time_max: DateTime<Utc>,
    /// Maximum number of events the server may return.
    pub max_results: usize,
}

impl EventQuery {
    /// Builds a query over `window`.
    pub fn new(calendar_id: impl Into<String>, window: &TimeWindow, max_results: usize) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            time_min: window.min(),
            time_max: window.max(),
            max_results,
        }
    }

    /// Query-string parameters, in the order they are sent.
    ///
    /// Timestamps are RFC 3339 in UTC with a `Z` suffix. Recurring events are
    /// expanded server-side and ordered by start time.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("maxResults", self.max_results.to_string()),
            (
                "timeMin",
                self.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "timeMax",
                self.time_max.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("orderBy", "startTime".to_string()),
            ("singleEvents", "true".to_string()),
        ]
    }
}

/// A freshly issued access token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// The bearer credential.
    pub access_token: String,
    /// Lifetime in seconds, as reported by the token endpoint.
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Network time for a timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTimestamp {
    /// Seconds since the Unix epoch.
    pub unixtime: i64,
    /// UTC offset of the timezone at that instant, e.g. `-08:00`.
    pub utc_offset: String,
    /// IANA name echoed back by the service.
    pub timezone: String,
}

/// The calendar events API.
pub trait CalendarApi: Send + Sync {
    /// Lists the events matching `query`, in server order.
    ///
    /// An explicit error payload from the server is reported as
    /// [`ProviderErrorCode::ApiError`](crate::ProviderErrorCode::ApiError).
    fn list_events<'a>(
        &'a self,
        query: &'a EventQuery,
        bearer: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>>;
}

/// The OAuth2 refresh-token exchange.
pub trait TokenExchange: Send + Sync {
    /// Trades the stored refresh token for a new access token.
    ///
    /// A rejected refresh token is reported as
    /// [`ProviderErrorCode::AuthenticationFailed`](crate::ProviderErrorCode::AuthenticationFailed).
    fn refresh(&self) -> BoxFuture<'_, ProviderResult<TokenGrant>>;
}

/// A network time service.
pub trait NetworkTime: Send + Sync {
    /// Current time as seen from `timezone` (IANA name).
    fn current_time<'a>(&'a self, timezone: &'a str) -> BoxFuture<'a, ProviderResult<NetworkTimestamp>>;
}
