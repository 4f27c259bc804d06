//! Daemon error types.

use std::io;

use calpanel_core::InvalidWindow;
use calpanel_providers::{AuthError, FetchError, TimeSyncError};
use thiserror::Error;

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Errors that can stop a sync cycle or the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Token refresh failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Events query failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Network time could not be obtained.
    #[error(transparent)]
    TimeSync(#[from] TimeSyncError),

    /// The lookahead produced an empty window.
    #[error(transparent)]
    Window(#[from] InvalidWindow),

    /// The display surface could not be drawn.
    #[error("display error: {0}")]
    Display(#[from] io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DaemonError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the daemon must stop.
    ///
    /// Non-fatal errors fail the current cycle only; the loop tries again
    /// after the refresh interval.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Auth(e) => e.is_fatal(),
            Self::Fetch(FetchError::Provider { .. }) => true,
            Self::Fetch(FetchError::Exhausted { .. }) => false,
            Self::TimeSync(TimeSyncError::Rejected(_)) => true,
            Self::TimeSync(TimeSyncError::Exhausted { .. }) => false,
            Self::Window(_) | Self::Config { .. } => true,
            Self::Display(_) => false,
        }
    }

    /// Short text for the on-screen status indicator.
    pub fn status_text(&self) -> String {
        match self {
            Self::Auth(e) => format!("Error: token refresh ({})", e.reason()),
            Self::Fetch(e) => format!("Error: get calendar ({})", e.reason()),
            Self::TimeSync(_) => "Error: time sync".to_string(),
            Self::Window(_) => "Error: time window".to_string(),
            Self::Display(_) => "Error: display".to_string(),
            Self::Config { .. } => "Error: configuration".to_string(),
        }
    }
}
