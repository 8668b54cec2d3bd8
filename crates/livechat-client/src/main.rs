//! livechat CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use livechat_client::cli::{Cli, Command, ConfigAction};
use livechat_client::commands;
use livechat_client::config::ClientSettings;
use livechat_client::error::{ClientError, ClientResult};
use livechat_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::cli(cli.debug)) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let settings = match cli.config {
        Some(ref path) => ClientSettings::load_from(path)?,
        None => ClientSettings::load()?,
    };

    match cli.command {
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(&settings),
            ConfigAction::Validate => commands::config::validate(&settings),
            ConfigAction::Path => commands::config::path(),
        },
        None => {
            let room_id = cli
                .room_id
                .ok_or_else(|| ClientError::Config("missing ROOM_ID (see --help)".to_string()))?;
            commands::watch::run(room_id, &cli, &settings).await
        }
    }
}
