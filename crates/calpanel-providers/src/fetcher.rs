//! Bounded, retried events query.

use std::sync::Arc;

use calpanel_core::{CalendarEvent, TimeWindow};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::link::NetworkLink;
use crate::provider::{CalendarApi, EventQuery};
use crate::retry::{retry, RetryError, RetryPolicy};
use crate::token::Token;

/// Fetches upcoming events through a [`CalendarApi`].
///
/// Transient failures are retried per the injected [`RetryPolicy`]; an
/// explicit error from the API fails at once.
pub struct CalendarFetcher {
    api: Arc<dyn CalendarApi>,
    policy: Arc<dyn RetryPolicy>,
    link: Arc<dyn NetworkLink>,
}

impl CalendarFetcher {
    /// Creates a fetcher.
    pub fn new(
        api: Arc<dyn CalendarApi>,
        policy: Arc<dyn RetryPolicy>,
        link: Arc<dyn NetworkLink>,
    ) -> Self {
        Self { api, policy, link }
    }

    /// Fetches at most `max_events` events starting inside `window`, in the
    /// order the API returns them.
    pub async fn fetch(
        &self,
        calendar_id: &str,
        window: &TimeWindow,
        max_events: usize,
        token: &Token,
    ) -> Result<Vec<CalendarEvent>, FetchError> {
        if max_events == 0 {
            return Ok(Vec::new());
        }

        let query = EventQuery::new(calendar_id, window, max_events);
        debug!(
            calendar = calendar_id,
            time_min = %query.time_min,
            time_max = %query.time_max,
            max_events,
            "querying events"
        );

        let api = &self.api;
        let query_ref = &query;
        let mut events = retry(self.policy.as_ref(), self.link.as_ref(), "calendar fetch", || {
            api.list_events(query_ref, token.bearer())
        })
        .await
        .map_err(|e| match e {
            RetryError::Fatal(err) => {
                warn!(error = %err, "calendar API returned an error");
                FetchError::Provider {
                    detail: err.message().to_string(),
                }
            }
            RetryError::Exhausted { attempts, last } => FetchError::Exhausted { attempts, last },
        })?;

        if events.len() > max_events {
            debug!(
                returned = events.len(),
                max_events, "server returned more events than requested"
            );
            events.truncate(max_events);
        }

        Ok(events)
    }
}

impl std::fmt::Debug for CalendarFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarFetcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ProviderResult};
    use crate::link::NoopLink;
    use crate::provider::BoxFuture;
    use crate::retry::BackoffPolicy;
    use calpanel_core::EventTime;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FakeCalendar {
        script: Mutex<VecDeque<ProviderResult<Vec<CalendarEvent>>>>,
        queries: Mutex<Vec<(EventQuery, String)>>,
    }

    impl FakeCalendar {
        fn new(script: Vec<ProviderResult<Vec<CalendarEvent>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    impl CalendarApi for FakeCalendar {
        fn list_events<'a>(
            &'a self,
            query: &'a EventQuery,
            bearer: &'a str,
        ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
            self.queries
                .lock()
                .unwrap()
                .push((query.clone(), bearer.to_string()));
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()));
            Box::pin(async move { next })
        }
    }

    #[derive(Default)]
    struct CountingLink(AtomicU32);

    impl NetworkLink for CountingLink {
        fn name(&self) -> &str {
            "counting"
        }

        fn reconnect(&self) -> BoxFuture<'_, ProviderResult<()>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn window() -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        TimeWindow::from_duration(now, ChronoDuration::seconds(90_000)).unwrap()
    }

    fn token() -> Token {
        Token::new("ya29.test", Duration::ZERO, Duration::from_secs(3600))
    }

    fn event(name: &str, ts: &str) -> CalendarEvent {
        CalendarEvent::new(name, EventTime::parse_date_time(ts).unwrap())
    }

    fn fetcher(api: Arc<FakeCalendar>, link: Arc<CountingLink>) -> CalendarFetcher {
        CalendarFetcher::new(api, Arc::new(BackoffPolicy::immediate()), link)
    }

    #[tokio::test]
    async fn passes_window_limit_and_bearer() {
        let api = Arc::new(FakeCalendar::new(vec![Ok(vec![event(
            "Team Sync",
            "2024-03-01T14:30:00Z",
        )])]));
        let fetcher = fetcher(api.clone(), Arc::default());

        let events = fetcher
            .fetch("me@example.com", &window(), 5, &token())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        let queries = api.queries.lock().unwrap();
        let (query, bearer) = &queries[0];
        assert_eq!(query.calendar_id, "me@example.com");
        assert_eq!(query.max_results, 5);
        assert_eq!(query.time_min, window().min());
        assert_eq!(query.time_max, window().max());
        assert_eq!(bearer, "ya29.test");
    }

    #[tokio::test]
    async fn caps_results_client_side() {
        let many = (0..8)
            .map(|i| event(&format!("event {}", i), "2024-03-01T16:00:00Z"))
            .collect();
        let api = Arc::new(FakeCalendar::new(vec![Ok(many)]));
        let fetcher = fetcher(api, Arc::default());

        let events = fetcher.fetch("primary", &window(), 3, &token()).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].summary, "event 2");
    }

    #[tokio::test]
    async fn zero_max_events_skips_request() {
        let api = Arc::new(FakeCalendar::new(vec![]));
        let fetcher = fetcher(api.clone(), Arc::default());

        let events = fetcher.fetch("primary", &window(), 0, &token()).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn empty_calendar() {
        let api = Arc::new(FakeCalendar::new(vec![Ok(vec![])]));
        let fetcher = fetcher(api, Arc::default());
        assert!(fetcher.fetch("primary", &window(), 5, &token()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_transient_failures_and_reconnects() {
        let api = Arc::new(FakeCalendar::new(vec![
            Err(ProviderError::network("connection reset")),
            Err(ProviderError::invalid_response("truncated")),
            Err(ProviderError::timeout("slow")),
            Ok(vec![event("Team Sync", "2024-03-01T14:30:00Z")]),
        ]));
        let link = Arc::new(CountingLink::default());
        let fetcher = fetcher(api.clone(), link.clone());

        let events = fetcher.fetch("primary", &window(), 5, &token()).await.unwrap();
        assert_eq!(events[0].summary, "Team Sync");
        assert_eq!(api.calls(), 4);
        // only the connection-level failures touch the link
        assert_eq!(link.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_error_is_not_retried() {
        let api = Arc::new(FakeCalendar::new(vec![Err(ProviderError::api(
            "404: Not Found",
        ))]));
        let fetcher = fetcher(api.clone(), Arc::default());

        let err = fetcher
            .fetch("primary", &window(), 5, &token())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Provider { ref detail } if detail == "404: Not Found"));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn capped_policy_exhausts() {
        let api = Arc::new(FakeCalendar::new(vec![
            Err(ProviderError::network("down")),
            Err(ProviderError::network("down")),
            Err(ProviderError::network("down")),
        ]));
        let fetcher = CalendarFetcher::new(
            api.clone(),
            Arc::new(BackoffPolicy::immediate().with_max_attempts(3)),
            Arc::new(NoopLink),
        );

        let err = fetcher
            .fetch("primary", &window(), 5, &token())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(api.calls(), 3);
    }
}
