//! Google Calendar clients.
//!
//! - [`GoogleCalendarClient`]: the events list endpoint ([`CalendarApi`](crate::CalendarApi))
//! - [`OAuthClient`]: the refresh-token exchange ([`TokenExchange`](crate::TokenExchange))
//!
//! # Example
//!
//! ```ignore
//! use calpanel_providers::google::{GoogleCalendarClient, GoogleConfig, OAuthClient, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::new(
//!     "your-client-id.apps.googleusercontent.com",
//!     "your-client-secret",
//!     "your-refresh-token",
//! );
//! let config = GoogleConfig::new(credentials, "me@example.com");
//!
//! let oauth = OAuthClient::new(&config)?;
//! let calendar = GoogleCalendarClient::new(config)?;
//! ```

mod client;
mod config;
mod oauth;

pub use client::{parse_events_response, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{parse_token_response, OAuthClient};

use crate::error::{ProviderError, ProviderResult};

fn build_http_client(config: &GoogleConfig) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| {
            ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                .with_source(e)
        })
}
