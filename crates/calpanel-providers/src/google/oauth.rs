//! OAuth 2.0 refresh-token exchange for Google APIs.
//!
//! The device never runs an interactive flow. It holds a refresh token issued
//! beforehand and trades it for short-lived access tokens:
//!
//! ```text
//! POST /token
//! client_id=..&client_secret=..&refresh_token=..&grant_type=refresh_token
//!
//! 200 {"access_token": "ya29...", "expires_in": 3599, "token_type": "Bearer"}
//! 400 {"error": "invalid_grant", "error_description": "Token has been expired or revoked."}
//! ```

use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, TokenExchange, TokenGrant};

use super::config::{GoogleConfig, OAuthCredentials};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// OAuth client for Google APIs.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client from the Google configuration.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            http_client: super::build_http_client(config)?,
        })
    }

    /// Exchanges the refresh token for a new access token.
    pub async fn refresh_token(&self) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        debug!(url = %self.token_url, "requesting access token");
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport("token refresh", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport("token refresh", e))?;

        let grant = parse_token_response(status, &body)?;
        info!(expires_in = grant.expires_in, "refreshed access token");
        Ok(grant)
    }
}

impl TokenExchange for OAuthClient {
    fn refresh(&self) -> BoxFuture<'_, ProviderResult<TokenGrant>> {
        Box::pin(self.refresh_token())
    }
}

/// Classifies a token endpoint response.
///
/// A 4xx other than 429 means the credentials were rejected. Rate limiting
/// and 5xx are transient.
pub fn parse_token_response(
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderResult<TokenGrant> {
    if status.is_success() {
        let response: TokenResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })?;

        if response.access_token.is_empty() {
            return Err(ProviderError::invalid_response(
                "token response has an empty access_token",
            ));
        }

        if let Some(kind) = response.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!(token_type = kind, "unexpected token type");
            }
        }

        let expires_in = response.expires_in.unwrap_or_else(|| {
            warn!(
                default_secs = DEFAULT_EXPIRES_IN_SECS,
                "token response has no expires_in, assuming default"
            );
            DEFAULT_EXPIRES_IN_SECS
        });
        if expires_in == 0 {
            return Err(ProviderError::invalid_response(
                "token response has expires_in = 0",
            ));
        }

        return Ok(TokenGrant {
            access_token: response.access_token,
            expires_in,
        });
    }

    let detail = serde_json::from_str::<TokenErrorResponse>(body)
        .map(|e| match e.error_description {
            Some(desc) => format!("{}: {}", e.error, desc),
            None => e.error,
        })
        .unwrap_or_else(|_| body.trim().to_string());

    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::server(format!(
            "token endpoint returned {}: {}",
            status, detail
        )));
    }

    Err(ProviderError::authentication(format!(
        "token refresh rejected ({}): {}",
        status, detail
    )))
}

/// Response from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Error body from Google's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use reqwest::StatusCode;

    #[test]
    fn successful_refresh() {
        let body = r#"{
            "access_token": "ya29.a0Af",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar.readonly",
            "token_type": "Bearer"
        }"#;
        let grant = parse_token_response(StatusCode::OK, body).unwrap();
        assert_eq!(grant.access_token, "ya29.a0Af");
        assert_eq!(grant.expires_in, 3599);
    }

    #[test]
    fn missing_expires_in_uses_default() {
        let grant =
            parse_token_response(StatusCode::OK, r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(grant.expires_in, DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn zero_expires_in_is_invalid() {
        let err = parse_token_response(
            StatusCode::OK,
            r#"{"access_token": "abc", "expires_in": 0}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_grant_is_authentication_failure() {
        let body = r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#;
        let err = parse_token_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("invalid_grant: Token has been expired or revoked."));
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_client_is_authentication_failure() {
        let err = parse_token_response(StatusCode::UNAUTHORIZED, r#"{"error": "invalid_client"}"#)
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }

    #[test]
    fn server_errors_are_transient() {
        let err = parse_token_response(StatusCode::SERVICE_UNAVAILABLE, "upstream down")
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.message().contains("upstream down"));

        let err = parse_token_response(StatusCode::TOO_MANY_REQUESTS, "{}").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn garbled_success_is_invalid_response() {
        let err = parse_token_response(StatusCode::OK, "<html>").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);

        let err = parse_token_response(StatusCode::OK, r#"{"access_token": ""}"#).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }
}
