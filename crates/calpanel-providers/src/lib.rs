//! Remote services for the calendar panel.
//!
//! This crate talks to the outside world:
//!
//! - [`CalendarApi`], [`TokenExchange`], [`NetworkTime`]: the three remote
//!   services, each behind a trait
//! - [`google`]: HTTP clients for the Calendar API and the OAuth2 token endpoint
//! - [`timeapi`]: HTTP client for network time and [`sync_clock`]
//! - [`TokenManager`]: keeps an access token valid
//! - [`CalendarFetcher`]: the bounded, retried events query
//! - [`RetryPolicy`] and [`NetworkLink`]: how failures are retried
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ Token        │   │ Calendar     │   │ Time         │
//!  │ endpoint     │   │ events API   │   │ service      │
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         │ TokenExchange    │ CalendarApi      │ NetworkTime
//!         ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ TokenManager │──▶│ Calendar     │   │ sync_clock   │
//!  │   (Token)    │   │ Fetcher      │   │              │
//!  └──────────────┘   └──────────────┘   └──────────────┘
//!          \                 │                 /
//!           └──── retry(RetryPolicy, NetworkLink) ────┘
//! ```

pub mod error;
pub mod fetcher;
pub mod google;
pub mod link;
pub mod provider;
pub mod retry;
pub mod timeapi;
pub mod token;

// Re-export main types at crate root
pub use error::{AuthError, FetchError, ProviderError, ProviderErrorCode, ProviderResult, TimeSyncError};
pub use fetcher::CalendarFetcher;
pub use link::{NetworkLink, NoopLink};
pub use provider::{
    BoxFuture, CalendarApi, EventQuery, NetworkTime, NetworkTimestamp, TokenExchange, TokenGrant,
};
pub use retry::{retry, BackoffPolicy, RetryError, RetryPolicy};
pub use timeapi::{sync_clock, WorldTimeClient};
pub use token::{Token, TokenManager};
