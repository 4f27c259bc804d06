//! Access token lifecycle.
//!
//! [`TokenManager`] keeps one bearer token alive for the lifetime of the
//! process. Expiry is tracked on the monotonic clock so the wall-clock
//! correction made at startup cannot make a token look fresh or stale.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use calpanel_core::TimeSource;
use tracing::{debug, info, warn};

use crate::error::{AuthError, ProviderError, ProviderErrorCode};
use crate::link::NetworkLink;
use crate::provider::TokenExchange;
use crate::retry::{retry, RetryError, RetryPolicy};

/// A bearer token and when it was obtained.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    bearer: String,
    obtained_at: Duration,
    expires_in: Duration,
}

impl Token {
    /// Creates a token obtained at monotonic instant `obtained_at`.
    pub fn new(bearer: impl Into<String>, obtained_at: Duration, expires_in: Duration) -> Self {
        Self {
            bearer: bearer.into(),
            obtained_at,
            expires_in,
        }
    }

    /// The credential sent in the `Authorization` header.
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    /// Monotonic instant at which the refresh completed.
    pub fn obtained_at(&self) -> Duration {
        self.obtained_at
    }

    /// Lifetime granted by the token endpoint.
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Returns true once `margin` or less of the lifetime is left at `now`.
    pub fn is_expired_at(&self, now: Duration, margin: Duration) -> bool {
        let elapsed = now.saturating_sub(self.obtained_at);
        elapsed >= self.expires_in.saturating_sub(margin)
    }

    /// Lifetime left at monotonic instant `now`.
    pub fn remaining_at(&self, now: Duration) -> Duration {
        let elapsed = now.saturating_sub(self.obtained_at);
        self.expires_in.saturating_sub(elapsed)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("bearer", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Refreshes the access token when it is missing or expired.
pub struct TokenManager {
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn TimeSource>,
    policy: Arc<dyn RetryPolicy>,
    link: Arc<dyn NetworkLink>,
    expiry_margin: Duration,
    token: Option<Token>,
}

impl TokenManager {
    /// Creates a manager with no token yet.
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        clock: Arc<dyn TimeSource>,
        policy: Arc<dyn RetryPolicy>,
        link: Arc<dyn NetworkLink>,
    ) -> Self {
        Self {
            exchange,
            clock,
            policy,
            link,
            expiry_margin: Duration::ZERO,
            token: None,
        }
    }

    /// Builder: refresh this long before the token actually expires.
    #[must_use]
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    /// The cached token, without refreshing.
    pub fn current(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Margin applied to `token`: never more than half its lifetime, so a
    /// short-lived grant is still usable once.
    fn margin_for(&self, token: &Token) -> Duration {
        self.expiry_margin.min(token.expires_in() / 2)
    }

    /// Returns true if the next [`ensure_valid`](Self::ensure_valid) will refresh.
    pub fn needs_refresh(&self) -> bool {
        match &self.token {
            None => true,
            Some(token) => token.is_expired_at(self.clock.monotonic(), self.margin_for(token)),
        }
    }

    /// Returns a token that is valid now, refreshing first if needed.
    pub async fn ensure_valid(&mut self) -> Result<Token, AuthError> {
        if let Some(token) = &self.token {
            let now = self.clock.monotonic();
            if !token.is_expired_at(now, self.margin_for(token)) {
                debug!(
                    remaining_secs = token.remaining_at(now).as_secs(),
                    "access token still valid"
                );
                return Ok(token.clone());
            }
            debug!("access token expired");
        }
        self.refresh().await
    }

    /// Performs the refresh exchange unconditionally.
    ///
    /// A grant with no lifetime is treated as a malformed response and
    /// retried. On failure the previous token, if any, is kept.
    pub async fn refresh(&mut self) -> Result<Token, AuthError> {
        let exchange = &self.exchange;
        let grant = retry(self.policy.as_ref(), self.link.as_ref(), "token refresh", || async move {
            let grant = exchange.refresh().await?;
            if grant.expires_in == 0 {
                return Err(ProviderError::invalid_response(
                    "token endpoint granted a token that is already expired",
                ));
            }
            Ok(grant)
        })
        .await
        .map_err(|e| match e {
            RetryError::Fatal(err) if err.code() == ProviderErrorCode::AuthenticationFailed => {
                warn!(error = %err, "refresh token rejected");
                AuthError::Revoked {
                    detail: err.message().to_string(),
                }
            }
            RetryError::Fatal(err) => {
                warn!(error = %err, "token refresh failed");
                AuthError::Rejected(err)
            }
            RetryError::Exhausted { attempts, last } => AuthError::Network { attempts, last },
        })?;

        let token = Token::new(
            grant.access_token,
            self.clock.monotonic(),
            Duration::from_secs(grant.expires_in),
        );
        info!(expires_in_secs = grant.expires_in, "obtained new access token");
        self.token = Some(token.clone());
        Ok(token)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("expiry_margin", &self.expiry_margin)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderResult;
    use crate::link::NoopLink;
    use crate::provider::{BoxFuture, TokenGrant};
    use crate::retry::BackoffPolicy;
    use calpanel_core::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses, then keeps issuing fresh tokens.
    #[derive(Default)]
    struct ScriptedExchange {
        script: Mutex<VecDeque<ProviderResult<TokenGrant>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedExchange {
        fn with(script: Vec<ProviderResult<TokenGrant>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl TokenExchange for ScriptedExchange {
        fn refresh(&self) -> BoxFuture<'_, ProviderResult<TokenGrant>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            let n = *calls;
            let next = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(TokenGrant {
                    access_token: format!("token-{}", n),
                    expires_in: 3600,
                })
            });
            Box::pin(async move { next })
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
            chrono_tz::UTC,
        ))
    }

    fn manager(exchange: Arc<ScriptedExchange>, clock: Arc<ManualClock>) -> TokenManager {
        TokenManager::new(
            exchange,
            clock,
            Arc::new(BackoffPolicy::immediate()),
            Arc::new(NoopLink),
        )
    }

    #[test]
    fn token_expiry() {
        let token = Token::new("t", Duration::from_secs(100), Duration::from_secs(3600));
        assert!(!token.is_expired_at(Duration::from_secs(100), Duration::ZERO));
        assert!(!token.is_expired_at(Duration::from_secs(3699), Duration::ZERO));
        assert!(token.is_expired_at(Duration::from_secs(3700), Duration::ZERO));
        assert!(token.is_expired_at(Duration::from_secs(3640), Duration::from_secs(60)));
        assert_eq!(token.remaining_at(Duration::from_secs(700)), Duration::from_secs(3000));
        assert_eq!(token.remaining_at(Duration::from_secs(9000)), Duration::ZERO);
    }

    #[test]
    fn token_debug_hides_bearer() {
        let token = Token::new("ya29.secret", Duration::ZERO, Duration::from_secs(1));
        assert!(!format!("{:?}", token).contains("ya29"));
    }

    #[tokio::test]
    async fn first_call_refreshes() {
        let exchange = Arc::new(ScriptedExchange::default());
        let mut tokens = manager(exchange.clone(), clock());

        assert!(tokens.current().is_none());
        assert!(tokens.needs_refresh());

        let token = tokens.ensure_valid().await.unwrap();
        assert_eq!(token.bearer(), "token-1");
        assert_eq!(exchange.calls(), 1);
        assert_eq!(tokens.current(), Some(&token));
    }

    #[tokio::test]
    async fn refreshes_exactly_at_expiry() {
        let exchange = Arc::new(ScriptedExchange::default());
        let clock = clock();
        let mut tokens = manager(exchange.clone(), clock.clone());

        tokens.ensure_valid().await.unwrap();

        clock.advance(Duration::from_secs(3599));
        assert_eq!(tokens.ensure_valid().await.unwrap().bearer(), "token-1");
        assert_eq!(exchange.calls(), 1);

        clock.advance(Duration::from_secs(1));
        assert!(tokens.needs_refresh());
        assert_eq!(tokens.ensure_valid().await.unwrap().bearer(), "token-2");
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn obtained_at_is_taken_after_exchange() {
        let exchange = Arc::new(ScriptedExchange::default());
        let clock = clock();
        clock.advance(Duration::from_secs(42));
        let mut tokens = manager(exchange, clock.clone());

        let token = tokens.refresh().await.unwrap();
        assert_eq!(token.obtained_at(), clock.monotonic());
    }

    #[tokio::test]
    async fn wall_clock_jump_does_not_expire_token() {
        let exchange = Arc::new(ScriptedExchange::default());
        let clock = clock();
        let mut tokens = manager(exchange.clone(), clock.clone());

        tokens.ensure_valid().await.unwrap();
        clock.set_wall_clock(4_000_000_000);
        tokens.ensure_valid().await.unwrap();
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn expiry_margin_refreshes_early() {
        let exchange = Arc::new(ScriptedExchange::default());
        let clock = clock();
        let mut tokens =
            manager(exchange.clone(), clock.clone()).with_expiry_margin(Duration::from_secs(300));

        tokens.ensure_valid().await.unwrap();
        clock.advance(Duration::from_secs(3300));
        assert_eq!(tokens.ensure_valid().await.unwrap().bearer(), "token-2");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let exchange = Arc::new(ScriptedExchange::with(vec![
            Err(ProviderError::network("no route")),
            Err(ProviderError::server("503")),
        ]));
        let mut tokens = manager(exchange.clone(), clock());

        let token = tokens.ensure_valid().await.unwrap();
        assert_eq!(token.bearer(), "token-3");
        assert_eq!(exchange.calls(), 3);
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_revoked() {
        let exchange = Arc::new(ScriptedExchange::with(vec![Err(
            ProviderError::authentication("invalid_grant: Token has been expired or revoked."),
        )]));
        let mut tokens = manager(exchange.clone(), clock());

        let err = tokens.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked { ref detail } if detail.contains("invalid_grant")));
        assert!(err.is_fatal());
        assert_eq!(exchange.calls(), 1);
        assert!(tokens.current().is_none());
    }

    #[tokio::test]
    async fn capped_retries_report_network_error() {
        let exchange = Arc::new(ScriptedExchange::with(vec![
            Err(ProviderError::timeout("slow")),
            Err(ProviderError::timeout("slow")),
        ]));
        let mut tokens = TokenManager::new(
            exchange.clone(),
            clock(),
            Arc::new(BackoffPolicy::immediate().with_max_attempts(2)),
            Arc::new(NoopLink),
        );

        let err = tokens.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Network { attempts: 2, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let exchange = Arc::new(ScriptedExchange::with(vec![
            Ok(TokenGrant {
                access_token: "first".into(),
                expires_in: 60,
            }),
            Err(ProviderError::authentication("invalid_grant")),
        ]));
        let clock = clock();
        let mut tokens = manager(exchange, clock.clone());

        tokens.ensure_valid().await.unwrap();
        clock.advance(Duration::from_secs(60));
        assert!(tokens.ensure_valid().await.is_err());
        assert_eq!(tokens.current().map(Token::bearer), Some("first"));
    }

    #[tokio::test]
    async fn zero_lifetime_grant_is_never_handed_out() {
        let exchange = Arc::new(ScriptedExchange::with(vec![Ok(TokenGrant {
            access_token: "stale".into(),
            expires_in: 0,
        })]));
        let clock = clock();
        let mut tokens = manager(exchange.clone(), clock.clone());

        let token = tokens.ensure_valid().await.unwrap();
        assert_eq!(token.bearer(), "token-2");
        assert!(!token.is_expired_at(clock.monotonic(), Duration::ZERO));
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn zero_lifetime_grants_exhaust_capped_policy() {
        let exchange = Arc::new(ScriptedExchange::with(vec![
            Ok(TokenGrant {
                access_token: "stale".into(),
                expires_in: 0,
            }),
            Ok(TokenGrant {
                access_token: "stale".into(),
                expires_in: 0,
            }),
        ]));
        let mut tokens = TokenManager::new(
            exchange,
            clock(),
            Arc::new(BackoffPolicy::immediate().with_max_attempts(2)),
            Arc::new(NoopLink),
        );

        let err = tokens.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Network { attempts: 2, .. }));
        assert!(tokens.current().is_none());
    }

    #[tokio::test]
    async fn margin_longer_than_lifetime_is_clamped() {
        let exchange = Arc::new(ScriptedExchange::with(vec![Ok(TokenGrant {
            access_token: "short".into(),
            expires_in: 60,
        })]));
        let clock = clock();
        let mut tokens =
            manager(exchange.clone(), clock.clone()).with_expiry_margin(Duration::from_secs(300));

        let token = tokens.ensure_valid().await.unwrap();
        assert_eq!(token.bearer(), "short");
        assert!(!tokens.needs_refresh());

        clock.advance(Duration::from_secs(29));
        assert_eq!(tokens.ensure_valid().await.unwrap().bearer(), "short");
        clock.advance(Duration::from_secs(1));
        assert_eq!(tokens.ensure_valid().await.unwrap().bearer(), "token-2");
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn configuration_error_is_not_reported_as_revoked() {
        let exchange = Arc::new(ScriptedExchange::with(vec![Err(
            ProviderError::configuration("token refresh: invalid request: relative URL"),
        )]));
        let mut tokens = manager(exchange.clone(), clock());

        let err = tokens.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref e) if e.code() == ProviderErrorCode::ConfigurationError));
        assert!(err.is_fatal());
        assert!(!err.to_string().contains("revoked"));
        assert_eq!(exchange.calls(), 1);
    }
}
