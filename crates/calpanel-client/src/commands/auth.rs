//! Authentication commands.

use std::sync::Arc;

use calpanel_core::DeviceClock;
use calpanel_providers::google::OAuthClient;
use calpanel_providers::{NoopLink, TokenManager};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Attempts allowed for a one-off check, even when the loop retries forever.
const CHECK_MAX_ATTEMPTS: u32 = 3;

/// Exchanges the refresh token once and prints how long the access token
/// is valid.
pub async fn check(config: &ClientConfig) -> ClientResult<()> {
    let google = config.google_config()?;
    let exchange = OAuthClient::new(&google)?;

    let mut policy = config.retry.policy();
    let max = policy
        .max_attempts
        .map_or(CHECK_MAX_ATTEMPTS, |m| m.min(CHECK_MAX_ATTEMPTS));
    policy = policy.with_max_attempts(max);

    let mut tokens = TokenManager::new(
        Arc::new(exchange),
        Arc::new(DeviceClock::new(config.timezone()?)),
        Arc::new(policy),
        Arc::new(NoopLink),
    );
    let token = tokens.refresh().await?;

    info!(expires_in = token.expires_in().as_secs(), "refresh token accepted");
    println!(
        "Refresh token is valid; access token expires in {}s.",
        token.expires_in().as_secs()
    );
    Ok(())
}
