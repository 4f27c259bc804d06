//! Retry policy for remote calls.
//!
//! Every network call the device makes (time sync, token refresh, events
//! query) goes through [`retry`]. The policy is injected so tests can simulate
//! failures without waiting on the wall clock, and so a deployment can cap the
//! otherwise unbounded retry loop.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::link::NetworkLink;

/// Decides whether and when a failed call is attempted again.
pub trait RetryPolicy: Send + Sync {
    /// Called after `attempt` attempts (1-based) have failed with `error`.
    fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool;

    /// Delay before the attempt following `attempt`.
    fn delay_for(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with an optional attempt cap.
///
/// Only retryable errors are retried. With `max_attempts` unset the policy
/// never gives up on a retryable error.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Total attempts allowed, including the first. `None` means unbounded.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Retries forever with no delay, as the original firmware loop did.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_attempts: None,
        }
    }

    /// Builder: cap the number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Builder: set backoff parameters.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.multiplier = multiplier;
        self
    }
}

impl RetryPolicy for BackoffPolicy {
    fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        if !error.is_retryable() {
            return false;
        }
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_secs_f64();
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = base * self.multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        Duration::try_from_secs_f64(delay.min(max).max(0.0)).unwrap_or(self.max_backoff)
    }
}

/// Why [`retry`] stopped without a result.
#[derive(Debug)]
pub enum RetryError {
    /// The error is not retryable.
    Fatal(ProviderError),
    /// The policy gave up after this many attempts.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last error seen.
        last: ProviderError,
    },
}

/// Runs `operation` until it succeeds or `policy` gives up.
///
/// Link-level failures ask `link` to re-establish the connection before the
/// next attempt. A failed reconnect is logged and the loop goes on.
pub async fn retry<T, F, Fut>(
    policy: &dyn RetryPolicy,
    link: &dyn NetworkLink,
    operation: &str,
    mut call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let error = match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !policy.should_retry(attempt, &error) {
            return Err(if error.is_retryable() {
                RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                }
            } else {
                RetryError::Fatal(error)
            });
        }

        warn!(operation, attempt, error = %error, "request failed, retrying");

        if error.is_link_level() {
            if let Err(e) = link.reconnect().await {
                warn!(operation, link = link.name(), error = %e, "failed to re-establish link");
            }
        }

        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            debug!(operation, delay_ms = delay.as_millis() as u64, "backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::NoopLink;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingLink {
        reconnects: AtomicU32,
    }

    impl NetworkLink for CountingLink {
        fn name(&self) -> &str {
            "counting"
        }

        fn reconnect(&self) -> crate::provider::BoxFuture<'_, crate::error::ProviderResult<()>> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn backoff_delays() {
        let policy = BackoffPolicy::default().with_backoff(
            Duration::from_secs(5),
            Duration::from_secs(300),
            2.0,
        );

        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(10), Duration::from_secs(300));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn huge_max_backoff_does_not_overflow() {
        let max = Duration::from_secs(u64::MAX);
        let policy = BackoffPolicy::default().with_backoff(Duration::from_secs(1), max, 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(200), max);
        assert_eq!(policy.delay_for(u32::MAX), max);
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = BackoffPolicy::immediate();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(1_000), Duration::ZERO);
        assert!(policy.should_retry(1_000_000, &ProviderError::network("down")));
    }

    #[test]
    fn should_retry_respects_cap_and_kind() {
        let policy = BackoffPolicy::immediate().with_max_attempts(3);
        let transient = ProviderError::timeout("slow");
        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
        assert!(!policy.should_retry(1, &ProviderError::api("bad request")));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let link = CountingLink::default();
        let policy = BackoffPolicy::immediate();

        let result = retry(&policy, &link, "test", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(ProviderError::network("link down"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert!(matches!(result, Ok(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(link.reconnects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_response_does_not_reconnect() {
        let calls = AtomicU32::new(0);
        let link = CountingLink::default();
        let policy = BackoffPolicy::immediate();

        let result = retry(&policy, &link, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::invalid_response("truncated JSON"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(link.reconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&BackoffPolicy::immediate(), &NoopLink, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::api("403 Forbidden")) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capped_policy_reports_exhaustion() {
        let policy = BackoffPolicy::immediate().with_max_attempts(4);
        let result: Result<(), _> = retry(&policy, &NoopLink, "test", || async {
            Err(ProviderError::timeout("slow"))
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(last.is_link_level());
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_between_attempts() {
        let policy = BackoffPolicy::default()
            .with_backoff(Duration::from_secs(10), Duration::from_secs(10), 1.0)
            .with_max_attempts(3);
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = retry(&policy, &NoopLink, "test", || async {
            Err(ProviderError::server("503"))
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        assert!(start.elapsed() >= Duration::from_secs(20));
    }
}
