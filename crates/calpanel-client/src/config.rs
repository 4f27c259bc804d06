//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calpanel/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`, `refresh_token`) support
//! secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use calpanel_core::{FormatOptions, Lookahead, TimeFormat};
use calpanel_daemon::DaemonConfig;
use calpanel_providers::google::{GoogleConfig, OAuthCredentials};
use calpanel_providers::{BackoffPolicy, WorldTimeClient};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::secret;

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the calpanel client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// IANA timezone of the device, used for the clock, the header and the
    /// lookahead window.
    pub timezone: String,

    /// Google Calendar settings.
    pub google: GoogleSettings,

    /// Display settings.
    pub display: DisplaySettings,

    /// Sync loop settings.
    pub sync: SyncSettings,

    /// Retry settings shared by every remote call.
    pub retry: RetrySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            google: GoogleSettings::default(),
            display: DisplaySettings::default(),
            sync: SyncSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// Google Calendar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Long-lived refresh token (supports `pass::` and `env::` prefixes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Calendar to display.
    pub calendar_id: String,

    /// Calendar API base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Token endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            calendar_id: "primary".to_string(),
            api_base: None,
            token_url: None,
        }
    }
}

/// Display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Number of event slots.
    pub max_events: usize,

    /// Names longer than this are cut and end with `...`.
    pub max_name_length: usize,

    /// `h12` ("2:30pm") or `h24` ("14:30").
    pub time_format: TimeFormat,

    /// Color the status line on the terminal.
    pub color: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_events: 5,
            max_name_length: calpanel_core::format::DEFAULT_MAX_NAME_LENGTH,
            time_format: TimeFormat::H12,
            color: true,
        }
    }
}

/// Sync loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between cycles.
    pub refresh_interval_secs: u64,

    /// How far ahead events are queried.
    pub lookahead: Lookahead,

    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,

    /// Set the clock from network time at startup.
    pub sync_clock: bool,

    /// Time service base URL.
    pub time_api_base: String,

    /// Refresh the access token this many seconds before it expires.
    pub token_expiry_margin_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            lookahead: Lookahead::default(),
            request_timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            sync_clock: true,
            time_api_base: WorldTimeClient::DEFAULT_BASE_URL.to_string(),
            token_expiry_margin_secs: 0,
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Delay before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Upper bound on the delay between attempts.
    pub max_backoff_secs: u64,

    /// Growth factor of the delay.
    pub multiplier: f64,

    /// Give up after this many attempts. Absent means retry forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 0,
            max_backoff_secs: 60,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl RetrySettings {
    /// Builds the retry policy.
    pub fn policy(&self) -> BackoffPolicy {
        let policy = BackoffPolicy::immediate().with_backoff(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_secs(self.max_backoff_secs),
            self.multiplier,
        );
        match self.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `path`, or from the default path.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses a TOML document.
    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content).map_err(|e| ClientError::config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calpanel")
    }

    /// The device timezone.
    pub fn timezone(&self) -> ClientResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ClientError::config(format!("unknown timezone `{}`", self.timezone)))
    }

    /// Sync loop configuration.
    pub fn daemon_config(&self) -> ClientResult<DaemonConfig> {
        let format = FormatOptions::default()
            .with_max_name_length(self.display.max_name_length)
            .with_time_format(self.display.time_format);

        let config = DaemonConfig::new(self.google.calendar_id.clone())
            .with_refresh_interval(Duration::from_secs(self.sync.refresh_interval_secs))
            .with_lookahead(self.sync.lookahead)
            .with_max_events(self.display.max_events)
            .with_format(format)
            .with_sync_clock(self.sync.sync_clock)
            .with_token_expiry_margin(Duration::from_secs(self.sync.token_expiry_margin_secs));
        config
            .validate()
            .map_err(|e| ClientError::config(e.to_string()))?;
        Ok(config)
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    /// Google client configuration, with secret references resolved.
    pub fn google_config(&self) -> ClientResult<GoogleConfig> {
        let credentials = self.google.resolve_credentials()?;
        let mut config = GoogleConfig::new(credentials, self.google.calendar_id.clone())
            .with_timeout(self.request_timeout());
        if let Some(ref base) = self.google.api_base {
            config = config.with_api_base(base);
        }
        if let Some(ref url) = self.google.token_url {
            config = config.with_token_url(url);
        }
        config.validate().map_err(ClientError::Config)?;
        Ok(config)
    }

    /// Checks every setting, including that credentials resolve.
    pub fn validate(&self) -> ClientResult<()> {
        self.timezone()?;
        self.daemon_config()?;
        if self.sync.request_timeout_secs == 0 {
            return Err(ClientError::config("request_timeout_secs must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ClientError::config("retry multiplier must be at least 1.0"));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ClientError::config("retry max_attempts must be at least 1"));
        }
        self.google_config()?;
        Ok(())
    }

    /// A copy safe to print: inline secrets are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for value in [
            &mut copy.google.client_id,
            &mut copy.google.client_secret,
            &mut copy.google.refresh_token,
        ]
        .into_iter()
        .flatten()
        {
            *value = secret::redact(value);
        }
        copy
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

impl GoogleSettings {
    /// Resolves the OAuth credentials.
    ///
    /// All three values must be set. Each is passed through
    /// [`secret::resolve`] to expand `pass::` and `env::` references.
    pub fn resolve_credentials(&self) -> ClientResult<OAuthCredentials> {
        let client_id = resolve_field("client_id", self.client_id.as_deref())?;
        let client_secret = resolve_field("client_secret", self.client_secret.as_deref())?;
        let refresh_token = resolve_field("refresh_token", self.refresh_token.as_deref())?;

        let credentials = OAuthCredentials::new(client_id, client_secret, refresh_token);
        credentials
            .validate()
            .map_err(|e| ClientError::config(format!("invalid Google credentials: {}", e)))?;
        Ok(credentials)
    }
}

fn resolve_field(name: &str, raw: Option<&str>) -> ClientResult<String> {
    let raw = raw.ok_or_else(|| {
        ClientError::config(format!(
            "{} is missing from the [google] section of {}",
            name,
            ClientConfig::default_path().display()
        ))
    })?;
    secret::resolve(raw).map_err(|e| ClientError::config(format!("failed to resolve {}: {}", name, e)))
}
