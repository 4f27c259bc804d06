//! Daemon configuration.

use std::time::Duration;

use calpanel_core::{FormatOptions, Lookahead};

use crate::error::{DaemonError, DaemonResult};

/// Shortest name limit that still leaves room for one character and `...`.
pub const MIN_NAME_LENGTH: usize = 4;

/// Sync loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Calendar to display.
    pub calendar_id: String,

    /// Pause between the end of one cycle and the start of the next.
    pub refresh_interval: Duration,

    /// How far ahead events are queried.
    pub lookahead: Lookahead,

    /// Number of display slots, and the most events ever requested.
    pub max_events: usize,

    /// How each event is rendered into a slot.
    pub format: FormatOptions,

    /// Whether to set the clock from network time before the first cycle.
    pub sync_clock: bool,

    /// Refresh the access token this long before it expires.
    pub token_expiry_margin: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            refresh_interval: Duration::from_secs(60),
            lookahead: Lookahead::default(),
            max_events: 5,
            format: FormatOptions::default(),
            sync_clock: true,
            token_expiry_margin: Duration::ZERO,
        }
    }
}

impl DaemonConfig {
    /// Creates a configuration for `calendar_id` with defaults elsewhere.
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            ..Default::default()
        }
    }

    /// Builder: set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Builder: set the lookahead.
    pub fn with_lookahead(mut self, lookahead: Lookahead) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Builder: set the number of slots.
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Builder: set formatting options.
    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Builder: enable or disable the startup clock sync.
    pub fn with_sync_clock(mut self, sync: bool) -> Self {
        self.sync_clock = sync;
        self
    }

    /// Builder: set the token expiry margin.
    pub fn with_token_expiry_margin(mut self, margin: Duration) -> Self {
        self.token_expiry_margin = margin;
        self
    }

    /// Checks the invariants the sync loop relies on.
    pub fn validate(&self) -> DaemonResult<()> {
        if self.calendar_id.trim().is_empty() {
            return Err(DaemonError::config("calendar_id must not be empty"));
        }
        if self.max_events == 0 {
            return Err(DaemonError::config("max_events must be at least 1"));
        }
        if self.format.max_name_length < MIN_NAME_LENGTH {
            return Err(DaemonError::config(format!(
                "max_name_length must be at least {}",
                MIN_NAME_LENGTH
            )));
        }
        if self.refresh_interval.is_zero() {
            return Err(DaemonError::config("refresh interval must be at least 1 second"));
        }
        if self.lookahead == Lookahead::Seconds(0) {
            return Err(DaemonError::config("lookahead must be greater than zero"));
        }
        Ok(())
    }
}
