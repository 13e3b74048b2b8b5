//! Command-line interface definition for laekning-eventhub
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// laekning-eventhub - Event Hubs event reporter
///
/// Reads the event hub named in Key Vault and prints a short report for
/// every event.
#[derive(Parser, Debug, Clone)]
#[command(name = "laekning-eventhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Key Vault name holding the stream secrets
    #[arg(long, env = "KEYVAULT_NAME")]
    pub vault_name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute (defaults to `listen`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Resolve secrets, open the event hub and report events until stopped
    Listen,

    /// Report newline-delimited event bodies from a file or stdin
    Report {
        /// Input file (reads stdin when omitted or `-`)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, `listen` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Listen)
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            vault_name: None,
            verbose: false,
            json_logs: false,
            command: None,
        }
    }
}
