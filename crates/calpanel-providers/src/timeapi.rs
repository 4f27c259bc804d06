//! Network time.
//!
//! The device has no battery-backed clock, so the wall clock is set once at
//! startup from a time service that answers for an IANA timezone:
//!
//! ```text
//! GET /api/timezone/America/Los_Angeles
//! {"unixtime": 1709305200, "utc_offset": "-08:00", "timezone": "America/Los_Angeles", ...}
//! ```

use std::time::Duration;

use calpanel_core::TimeSource;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult, TimeSyncError};
use crate::link::NetworkLink;
use crate::provider::{BoxFuture, NetworkTime, NetworkTimestamp};
use crate::retry::{retry, RetryError, RetryPolicy};

/// Client for a worldtimeapi.org-compatible service.
#[derive(Debug)]
pub struct WorldTimeClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl WorldTimeClient {
    /// Public service endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "http://worldtimeapi.org/api/timezone";

    /// Creates a client for `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    /// URL queried for `timezone`. Path separators in the name are kept.
    pub fn url_for(&self, timezone: &str) -> String {
        let path = timezone
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_time(&self, timezone: &str) -> ProviderResult<NetworkTimestamp> {
        let url = self.url_for(timezone);
        debug!(url = %url, "requesting network time");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("network time", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport("network time", e))?;

        parse_time_response(status, &body)
    }
}

impl NetworkTime for WorldTimeClient {
    fn current_time<'a>(&'a self, timezone: &'a str) -> BoxFuture<'a, ProviderResult<NetworkTimestamp>> {
        Box::pin(self.fetch_time(timezone))
    }
}

#[derive(Debug, Deserialize)]
struct TimeResponse {
    unixtime: i64,
    #[serde(default)]
    utc_offset: String,
    #[serde(default)]
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct TimeErrorResponse {
    error: String,
}

/// Classifies a time service response.
///
/// An unknown timezone is reported by the service as a 404 with an `error`
/// member and is never retried.
pub fn parse_time_response(
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderResult<NetworkTimestamp> {
    if let Ok(err) = serde_json::from_str::<TimeErrorResponse>(body) {
        if status.is_client_error() {
            return Err(ProviderError::api(format!("{}: {}", status.as_u16(), err.error)));
        }
    }

    if !status.is_success() {
        return Err(ProviderError::server(format!("time service returned {}", status)));
    }

    let parsed: TimeResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse time response: {}", e))
    })?;

    Ok(NetworkTimestamp {
        unixtime: parsed.unixtime,
        utc_offset: parsed.utc_offset,
        timezone: parsed.timezone,
    })
}

/// Sets the wall clock of `clock` from network time for its timezone.
pub async fn sync_clock(
    time: &dyn NetworkTime,
    clock: &dyn TimeSource,
    policy: &dyn RetryPolicy,
    link: &dyn NetworkLink,
) -> Result<NetworkTimestamp, TimeSyncError> {
    let tz = clock.timezone();
    let name = tz.name();

    let stamp = retry(policy, link, "time sync", || time.current_time(name))
        .await
        .map_err(|e| match e {
            RetryError::Fatal(err) => TimeSyncError::Rejected(err),
            RetryError::Exhausted { attempts, last } => TimeSyncError::Exhausted { attempts, last },
        })?;

    if !stamp.timezone.is_empty() && stamp.timezone != name {
        warn!(
            requested = name,
            returned = %stamp.timezone,
            "time service answered for a different timezone"
        );
    }

    let before = clock.now();
    clock.set_wall_clock(stamp.unixtime);
    let drift = clock.now() - before;
    info!(
        timezone = name,
        utc_offset = %stamp.utc_offset,
        drift_secs = drift.num_seconds(),
        "device clock set from network time"
    );

    Ok(stamp)
}
