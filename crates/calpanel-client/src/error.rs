//! Client error types.

use calpanel_core::TracingError;
use calpanel_daemon::DaemonError;
use calpanel_providers::{AuthError, ProviderError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A secret reference could not be resolved.
    #[error("secret error: {0}")]
    Secret(String),

    /// Building a provider client failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The refresh exchange failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The sync loop stopped on a fatal error.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
