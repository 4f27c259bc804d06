//! Error types for provider operations.
//!
//! [`ProviderError`] is the transport-level error every remote call returns.
//! The domain errors built on top of it are what callers act on:
//! - [`AuthError`]: the token refresh exchange failed
//! - [`FetchError`]: the events query failed for good
//! - [`TimeSyncError`]: network time could not be obtained

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// The provider answered with an explicit error payload.
    ApiError,
    /// The OAuth provider rejected the refresh token or client credentials.
    AuthenticationFailed,
    /// Connection failed, DNS resolution failed, link down.
    NetworkError,
    /// The request timed out.
    Timeout,
    /// The server answered with a 5xx status and no usable payload.
    ServerError,
    /// The response could not be read or parsed.
    InvalidResponse,
    /// Missing or invalid configuration (bad URL, empty credentials).
    ConfigurationError,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ServerError | Self::InvalidResponse
        )
    }

    /// Returns true if the failure points at the network link itself.
    pub fn is_link_level(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }

    /// Returns a human-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a remote service.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an explicit API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ApiError, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Timeout, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the link should be re-established before retrying.
    pub fn is_link_level(&self) -> bool {
        self.code.is_link_level()
    }

    /// Classifies a reqwest transport error.
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        let base = if err.is_timeout() {
            Self::timeout(format!("{}: request timed out", context))
        } else if err.is_connect() {
            Self::network(format!("{}: connection failed: {}", context, err))
        } else if err.is_builder() {
            Self::configuration(format!("{}: invalid request: {}", context, err))
        } else if err.is_decode() || err.is_body() {
            Self::invalid_response(format!("{}: failed to read response: {}", context, err))
        } else {
            Self::network(format!("{}: request failed: {}", context, err))
        };
        base.with_source(err)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// The token refresh exchange failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider rejected the refresh token. Re-authorization is required.
    #[error("refresh token rejected (has it been revoked?): {detail}")]
    Revoked {
        /// What the provider said.
        detail: String,
    },

    /// The exchange could not be attempted or answered unusably, for a reason
    /// other than the refresh token itself (bad endpoint URL, API error).
    #[error("token refresh failed: {0}")]
    Rejected(ProviderError),

    /// The exchange kept failing on the network until the retry policy gave up.
    #[error("token refresh failed after {attempts} attempt(s): {last}")]
    Network {
        /// Number of attempts made.
        attempts: u32,
        /// The last transport error.
        last: ProviderError,
    },
}

impl AuthError {
    /// Short reason used in status text and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Revoked { .. } => "revoked",
            Self::Rejected(_) => "rejected",
            Self::Network { .. } => "network",
        }
    }

    /// Returns true if retrying later cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Revoked { .. } | Self::Rejected(_))
    }
}

/// The events query failed for good.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider returned a well-formed error payload. Never retried.
    #[error("calendar provider error: {detail}")]
    Provider {
        /// The provider's error detail.
        detail: String,
    },

    /// Transient failures continued until the retry policy gave up.
    #[error("calendar fetch gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transport error.
        last: ProviderError,
    },
}

impl FetchError {
    /// Short reason used in status text and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider_error",
            Self::Exhausted { .. } => "transient",
        }
    }
}

/// Network time could not be obtained.
#[derive(Debug, Error)]
pub enum TimeSyncError {
    /// The time service answered with something unusable. Never retried.
    #[error("time service error: {0}")]
    Rejected(ProviderError),

    /// Transient failures continued until the retry policy gave up.
    #[error("time sync gave up after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transport error.
        last: ProviderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::Timeout.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(ProviderErrorCode::InvalidResponse.is_retryable());
        assert!(!ProviderErrorCode::ApiError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ProviderErrorCode::ConfigurationError.is_retryable());
    }

    #[test]
    fn error_code_link_level() {
        assert!(ProviderErrorCode::NetworkError.is_link_level());
        assert!(ProviderErrorCode::Timeout.is_link_level());
        assert!(!ProviderErrorCode::InvalidResponse.is_link_level());
        assert!(!ProviderErrorCode::ServerError.is_link_level());
    }

    #[test]
    fn provider_error_creation() {
        let err = ProviderError::api("401 Invalid Credentials");
        assert_eq!(err.code(), ProviderErrorCode::ApiError);
        assert_eq!(err.message(), "401 Invalid Credentials");
        assert!(!err.is_retryable());
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::timeout("calendar events: request timed out");
        let display = err.to_string();
        assert!(display.starts_with("timeout:"));
        assert!(display.contains("calendar events"));
    }

    #[test]
    fn provider_error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("socket closed");
        let err = ProviderError::network("link down").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn domain_error_reasons() {
        let revoked = AuthError::Revoked {
            detail: "invalid_grant".into(),
        };
        assert_eq!(revoked.reason(), "revoked");
        assert!(revoked.is_fatal());

        let network = AuthError::Network {
            attempts: 3,
            last: ProviderError::network("down"),
        };
        assert_eq!(network.reason(), "network");
        assert!(!network.is_fatal());

        let rejected = AuthError::Rejected(ProviderError::configuration("bad token_url"));
        assert_eq!(rejected.reason(), "rejected");
        assert!(rejected.is_fatal());
        assert!(!rejected.to_string().contains("revoked"));

        let provider = FetchError::Provider {
            detail: "404 Not Found".into(),
        };
        assert_eq!(provider.reason(), "provider_error");
        assert!(provider.to_string().contains("404 Not Found"));
    }
}
