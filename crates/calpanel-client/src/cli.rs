//! Command-line interface definition.

use std::path::PathBuf;

use calpanel_core::{TracingConfig, TracingOutputFormat};
use clap::{Parser, Subcommand};

/// calpanel - upcoming calendar events on a small display
#[derive(Debug, Parser)]
#[command(name = "calpanel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALPANEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Draw the board without colors
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The command to run; `run` when none is given.
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }

    /// Logging setup for this invocation.
    pub fn tracing_config(&self) -> TracingConfig {
        let config = if self.debug {
            TracingConfig::cli_debug()
        } else {
            match self.command() {
                Command::Run => TracingConfig::daemon(),
                _ => TracingConfig::default().with_level(tracing::Level::WARN),
            }
        };
        if self.json_logs {
            config.with_format(TracingOutputFormat::Json)
        } else {
            config
        }
    }
}

/// Available commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the sync loop until interrupted (default)
    Run,

    /// Sync the clock, run one cycle and exit
    Once,

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication actions.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum AuthAction {
    /// Exchange the refresh token once and report the expiry
    Check,
}

/// Configuration actions.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration, secrets masked
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
