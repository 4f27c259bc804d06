//! calpanel CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calpanel_client::cli::{AuthAction, Cli, Command, ConfigAction};
use calpanel_client::commands;
use calpanel_client::config::ClientConfig;
use calpanel_client::error::{ClientError, ClientResult};
use calpanel_core::init_tracing;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.tracing_config()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: {}", ClientError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    // `config path` works even when the file is broken.
    if let Command::Config {
        action: ConfigAction::Path,
    } = cli.command()
    {
        return commands::config::path(&path);
    }

    let config = ClientConfig::load(cli.config.as_deref())?;

    match cli.command() {
        Command::Run => commands::run::daemon(&cli, &config).await,
        Command::Once => commands::run::once(&cli, &config).await,
        Command::Auth {
            action: AuthAction::Check,
        } => commands::auth::check(&config).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&path),
        },
    }
}
