//! # Trove History CLI
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (`TROVE_LOG`, default `info`)
//! 2. Load configuration from `TROVE_*` variables, then CLI overrides
//! 3. Build the explorer client
//! 4. Run the subcommand; Ctrl-C cancels it and keeps partial results

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trove_history::{ExplorerLogSource, LogSource, TroveConfig};
use trove_runtime::{commands, Cli, Command};

fn load_config(cli: &Cli) -> Result<TroveConfig> {
    let mut config = TroveConfig::from_env().context("invalid TROVE_* environment")?;
    if let Some(key) = &cli.api_key {
        config.api_key = key.clone();
    }
    if config.api_key.is_empty() {
        warn!("No explorer API key set; requests will be heavily rate limited");
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("TROVE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!("Explorer: {}", config.api_url);

    let source: Arc<dyn LogSource> = Arc::new(ExplorerLogSource::new(&config)?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            on_signal.cancel();
        }
    });

    let output = match &cli.command {
        Command::Account { address } => {
            commands::run_account(config, source, address, &cancel).await?
        }
        Command::Scan(args) => {
            commands::run_scan(config, source, args, &cli.session_dir, &cancel).await?
        }
    };
    println!("{output}");
    Ok(())
}
