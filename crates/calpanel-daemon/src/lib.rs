//! Daemon: sync scheduler, display board, shutdown signals.
//!
//! This crate drives the panel:
//! - Setting the device clock from network time at startup
//! - Keeping the access token fresh
//! - Polling upcoming events on a fixed interval
//! - Drawing the event slots and a status indicator
//!
//! # Example
//!
//! ```rust,no_run
//! use calpanel_daemon::{DaemonConfig, Scheduler, Services, SignalHandler, TerminalDisplay};
//! # async fn run(services: Services) -> Result<(), Box<dyn std::error::Error>> {
//! let signals = SignalHandler::new();
//! signals.spawn_listener();
//!
//! let mut scheduler = Scheduler::new(
//!     DaemonConfig::new("me@example.com"),
//!     services,
//!     Box::new(TerminalDisplay::stdout(true)),
//! )?;
//! scheduler.run(signals.shutdown()).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod display;
mod error;
mod scheduler;
mod signals;

pub use config::{DaemonConfig, MIN_NAME_LENGTH};
pub use display::{
    DisplayBoard, DisplaySurface, STATUS_ERROR_COLOR, STATUS_OK_COLOR, SUCCESS_TEXT, Status,
    StatusKind, TerminalDisplay, render_text,
};
pub use error::{DaemonError, DaemonResult};
pub use scheduler::{Scheduler, SchedulerPhase, SchedulerState, Services};
pub use signals::{ShutdownSignal, SignalHandler};
