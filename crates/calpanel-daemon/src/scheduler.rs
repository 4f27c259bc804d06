//! The sync loop.
//!
//! One [`Scheduler`] owns everything the panel needs: the device clock, the
//! access token, the events fetcher and the display board. It moves through
//! these phases:
//!
//! ```text
//! SyncingTime ─▶ Authorizing ─▶ Polling ─▶ Displaying ─▶ Sleeping
//!   (once)            ▲                                    │
//!                     └────────────────────────────────────┘
//! ```
//!
//! A failed cycle turns the status indicator red and the loop carries on;
//! only fatal errors (revoked refresh token, explicit API error) or a
//! shutdown signal stop it.

use std::fmt;
use std::sync::Arc;

use calpanel_core::{EventFormatter, TimeSource, TimeWindow};
use calpanel_providers::{
    BackoffPolicy, CalendarApi, CalendarFetcher, NetworkLink, NetworkTime, NoopLink, RetryPolicy,
    TokenExchange, TokenManager, sync_clock,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::display::{DisplayBoard, DisplaySurface, Status};
use crate::error::{DaemonError, DaemonResult};
use crate::signals::ShutdownSignal;

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Setting the device clock from network time.
    SyncingTime,
    /// Making sure the access token is valid.
    Authorizing,
    /// Querying upcoming events.
    Polling,
    /// Formatting events and drawing the board.
    Displaying,
    /// Waiting for the next cycle.
    Sleeping,
}

impl SchedulerPhase {
    /// Returns a short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncingTime => "syncing_time",
            Self::Authorizing => "authorizing",
            Self::Polling => "polling",
            Self::Displaying => "displaying",
            Self::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and last outcome of the sync loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Completed cycles, successful or not.
    pub cycles: u64,
    /// Number of consecutive failed cycles.
    pub consecutive_failures: u32,
    /// Wall-clock time of the last successful cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Whether the device clock has been set from network time.
    pub clock_synced: bool,
}

impl SchedulerState {
    /// Records a successful cycle.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.cycles += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        self.last_error = None;
    }

    /// Records a failed cycle.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.cycles += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
    }
}

/// The remote services and device hooks a [`Scheduler`] drives.
#[derive(Clone)]
pub struct Services {
    /// Device clock.
    pub clock: Arc<dyn TimeSource>,
    /// Calendar events API.
    pub calendar: Arc<dyn CalendarApi>,
    /// OAuth2 refresh exchange.
    pub tokens: Arc<dyn TokenExchange>,
    /// Network time service.
    pub time: Arc<dyn NetworkTime>,
    /// Retry policy shared by every remote call.
    pub policy: Arc<dyn RetryPolicy>,
    /// Network link re-established on connection failures.
    pub link: Arc<dyn NetworkLink>,
}

impl Services {
    /// Services with the default retry policy (retry forever, no delay) and
    /// an OS-managed link.
    pub fn new(
        clock: Arc<dyn TimeSource>,
        calendar: Arc<dyn CalendarApi>,
        tokens: Arc<dyn TokenExchange>,
        time: Arc<dyn NetworkTime>,
    ) -> Self {
        Self {
            clock,
            calendar,
            tokens,
            time,
            policy: Arc::new(BackoffPolicy::immediate()),
            link: Arc::new(NoopLink),
        }
    }

    /// Builder: set the retry policy.
    pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Builder: set the network link.
    pub fn with_link(mut self, link: Arc<dyn NetworkLink>) -> Self {
        self.link = link;
        self
    }
}

/// Runs the calendar sync loop.
pub struct Scheduler {
    config: DaemonConfig,
    clock: Arc<dyn TimeSource>,
    time: Arc<dyn NetworkTime>,
    policy: Arc<dyn RetryPolicy>,
    link: Arc<dyn NetworkLink>,
    tokens: TokenManager,
    fetcher: CalendarFetcher,
    formatter: EventFormatter,
    board: DisplayBoard,
    surface: Box<dyn DisplaySurface>,
    phase: SchedulerPhase,
    state: SchedulerState,
}

impl Scheduler {
    /// Creates a scheduler drawing on `surface`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        config: DaemonConfig,
        services: Services,
        surface: Box<dyn DisplaySurface>,
    ) -> DaemonResult<Self> {
        config.validate()?;

        let tokens = TokenManager::new(
            services.tokens,
            services.clock.clone(),
            services.policy.clone(),
            services.link.clone(),
        )
        .with_expiry_margin(config.token_expiry_margin);
        let fetcher = CalendarFetcher::new(
            services.calendar,
            services.policy.clone(),
            services.link.clone(),
        );

        Ok(Self {
            formatter: EventFormatter::new(config.format.clone()),
            board: DisplayBoard::new(config.max_events),
            clock: services.clock,
            time: services.time,
            policy: services.policy,
            link: services.link,
            tokens,
            fetcher,
            surface,
            phase: SchedulerPhase::SyncingTime,
            state: SchedulerState::default(),
            config,
        })
    }

    /// The current phase.
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// The display board as last committed.
    pub fn board(&self) -> &DisplayBoard {
        &self.board
    }

    /// Loop counters.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// The token manager, for diagnostics.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// The active configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    fn set_phase(&mut self, phase: SchedulerPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase change");
            self.phase = phase;
        }
    }

    /// Sets the device clock from network time.
    pub async fn sync_time(&mut self) -> DaemonResult<()> {
        self.set_phase(SchedulerPhase::SyncingTime);
        let result = sync_clock(
            self.time.as_ref(),
            self.clock.as_ref(),
            self.policy.as_ref(),
            self.link.as_ref(),
        )
        .await;

        match result {
            Ok(_) => {
                self.state.clock_synced = true;
                Ok(())
            }
            Err(e) => {
                let err = DaemonError::from(e);
                self.show_failure(&err);
                Err(err)
            }
        }
    }

    /// Runs one Authorizing → Polling → Displaying pass.
    ///
    /// Returns the number of events shown. On failure the status indicator
    /// is set to the error and the previous slots stay on the board.
    pub async fn run_cycle(&mut self) -> DaemonResult<usize> {
        match self.cycle().await {
            Ok(count) => {
                self.state.record_success(self.clock.now());
                Ok(count)
            }
            Err(e) => {
                self.state.record_failure(e.to_string());
                self.show_failure(&e);
                Err(e)
            }
        }
    }

    async fn cycle(&mut self) -> DaemonResult<usize> {
        self.set_phase(SchedulerPhase::Authorizing);
        let token = self.tokens.ensure_valid().await?;

        self.set_phase(SchedulerPhase::Polling);
        let header = self.formatter.header(&self.clock.local_now());
        self.board.set_header(header);

        let window = TimeWindow::lookahead(
            self.clock.now(),
            self.config.lookahead,
            &self.clock.timezone(),
        )?;
        let events = self
            .fetcher
            .fetch(
                &self.config.calendar_id,
                &window,
                self.config.max_events,
                &token,
            )
            .await?;

        self.set_phase(SchedulerPhase::Displaying);
        let slots = self.formatter.format_all(&events);
        let count = self.board.commit(slots);
        self.board.set_status(Status::success());
        self.surface.render(&self.board)?;

        info!(events = count, "calendar updated");
        Ok(count)
    }

    fn show_failure(&mut self, err: &DaemonError) {
        self.board.set_status(Status::error(err.status_text()));
        if let Err(e) = self.surface.render(&self.board) {
            warn!(error = %e, "failed to draw error status");
        }
    }

    /// Runs the loop until a fatal error or `shutdown`.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the loop.
    pub async fn run(&mut self, shutdown: ShutdownSignal) -> DaemonResult<()> {
        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        info!(
            calendar = %self.config.calendar_id,
            interval_secs = self.config.refresh_interval.as_secs(),
            max_events = self.config.max_events,
            "scheduler started"
        );

        loop {
            tokio::select! {
                result = self.step() => {
                    if let Err(e) = result {
                        error!(error = %e, "fatal error, stopping");
                        return Err(e);
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }

            self.set_phase(SchedulerPhase::Sleeping);
            debug!(
                secs = self.config.refresh_interval.as_secs(),
                "sleeping until next cycle"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.refresh_interval) => {}
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// One loop iteration. Only fatal errors are returned.
    async fn step(&mut self) -> DaemonResult<()> {
        if self.config.sync_clock && !self.state.clock_synced {
            match self.sync_time().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "time sync failed, using current clock"),
            }
        }

        match self.run_cycle().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    error = %e,
                    failures = self.state.consecutive_failures,
                    "sync cycle failed"
                );
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
