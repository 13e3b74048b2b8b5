//! laekning-eventhub - Event Hubs event reporter
//!
#![doc = "Main entry point for the laekning-eventhub binary."]

use std::process::ExitCode;

use anyhow::Result;

use laekning_eventhub::cli::{Cli, Commands};
use laekning_eventhub::commands;
use laekning_eventhub::config::Config;
use laekning_eventhub::logging::{bootstrap_subscriber, init_logging};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        Config::load(config_path, &cli)
    })?;

    // Validate configuration
    config.validate()?;

    init_logging(&config.logging)?;

    match cli.command() {
        Commands::Listen => {
            tracing::info!(vault = %config.key_vault.resolved_url(), "Starting listen mode");
            commands::listen::run_listen(config, shutdown_signal()).await
        }
        Commands::Report { input } => {
            tracing::info!("Starting report mode");
            commands::report::run_report(&config, input.as_deref())?;
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be watched.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
