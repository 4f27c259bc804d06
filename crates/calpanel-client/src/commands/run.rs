//! The sync loop commands.
//!
//! Builds the device clock, the Google clients and the time client from
//! configuration, then hands them to the daemon's scheduler.

use std::sync::Arc;

use calpanel_core::DeviceClock;
use calpanel_daemon::{Scheduler, Services, SignalHandler, TerminalDisplay};
use calpanel_providers::WorldTimeClient;
use calpanel_providers::google::{GoogleCalendarClient, OAuthClient};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Builds the remote services from configuration.
pub fn build_services(config: &ClientConfig) -> ClientResult<Services> {
    let google = config.google_config()?;
    let clock = Arc::new(DeviceClock::new(config.timezone()?));
    let tokens = Arc::new(OAuthClient::new(&google)?);
    let calendar = Arc::new(GoogleCalendarClient::new(google)?);
    let time = Arc::new(WorldTimeClient::new(
        config.sync.time_api_base.clone(),
        config.request_timeout(),
    )?);

    Ok(Services::new(clock, calendar, tokens, time).with_policy(Arc::new(config.retry.policy())))
}

fn build_scheduler(cli: &Cli, config: &ClientConfig) -> ClientResult<Scheduler> {
    let services = build_services(config)?;
    let surface = TerminalDisplay::stdout(config.display.color && !cli.no_color);
    Ok(Scheduler::new(config.daemon_config()?, services, Box::new(surface))?)
}

/// Runs the sync loop until SIGTERM/SIGINT or a fatal error.
pub async fn daemon(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let mut scheduler = build_scheduler(cli, config)?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    info!(timezone = %config.timezone, "starting calpanel");
    scheduler.run(signals.shutdown()).await?;
    info!("calpanel stopped");
    Ok(())
}

/// Syncs the clock, runs a single cycle and exits.
pub async fn once(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let mut scheduler = build_scheduler(cli, config)?;

    if scheduler.config().sync_clock
        && let Err(e) = scheduler.sync_time().await
    {
        if e.is_fatal() {
            return Err(e.into());
        }
        warn!(error = %e, "time sync failed, using current clock");
    }

    let count = scheduler.run_cycle().await?;
    info!(events = count, "cycle complete");
    Ok(())
}
