//! Google Calendar provider configuration.

use std::fmt;
use std::time::Duration;

/// OAuth 2.0 credentials for the refresh-token exchange.
///
/// The refresh token is obtained once, out of band, and stored with the
/// device configuration. Only the refresh exchange is performed here.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
    /// The long-lived refresh token.
    pub refresh_token: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Checks that every field is present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.trim().is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.trim().is_empty() {
            return Err("client_secret is required");
        }
        if self.refresh_token.trim().is_empty() {
            return Err("refresh_token is required");
        }
        Ok(())
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Configuration for the Google Calendar clients.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth credentials for API access.
    pub credentials: OAuthCredentials,

    /// Calendar to read events from.
    pub calendar_id: String,

    /// Base URL of the Calendar API v3.
    pub api_base: String,

    /// Token endpoint for the refresh exchange.
    pub token_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Calendar API v3 base URL.
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    /// OAuth2 token endpoint.
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Creates a new Google configuration for `calendar_id`.
    pub fn new(credentials: OAuthCredentials, calendar_id: impl Into<String>) -> Self {
        Self {
            credentials,
            calendar_id: calendar_id.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calpanel/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the Calendar API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// URL of the events collection for `calendar_id`.
    pub fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(calendar_id)
        )
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id is required".to_string());
        }

        if self.timeout.is_zero() {
            return Err("request timeout must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> OAuthCredentials {
        OAuthCredentials::new(
            "test-client.apps.googleusercontent.com",
            "test-secret",
            "1//refresh",
        )
    }

    #[test]
    fn credentials_validation() {
        assert!(test_credentials().validate().is_ok());

        let missing_id = OAuthCredentials::new("", "secret", "refresh");
        assert_eq!(missing_id.validate(), Err("client_id is required"));

        let missing_secret = OAuthCredentials::new("id", " ", "refresh");
        assert_eq!(missing_secret.validate(), Err("client_secret is required"));

        let missing_refresh = OAuthCredentials::new("id", "secret", "");
        assert_eq!(missing_refresh.validate(), Err("refresh_token is required"));
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let debug = format!("{:?}", test_credentials());
        assert!(debug.contains("test-client"));
        assert!(!debug.contains("test-secret"));
        assert!(!debug.contains("1//refresh"));
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(test_credentials(), "primary");
        assert_eq!(config.api_base, GoogleConfig::DEFAULT_API_BASE);
        assert_eq!(config.token_url, GoogleConfig::DEFAULT_TOKEN_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("calpanel/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let config = GoogleConfig::new(test_credentials(), "me@example.com")
            .with_api_base("http://localhost:9000/calendar/v3/");
        assert_eq!(
            config.events_url(&config.calendar_id),
            "http://localhost:9000/calendar/v3/calendars/me%40example.com/events"
        );
    }

    #[test]
    fn config_validation() {
        let config = GoogleConfig::new(test_credentials(), "");
        assert!(config.validate().is_err());

        let config = GoogleConfig::new(test_credentials(), "primary").with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
