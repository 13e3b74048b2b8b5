//! Configuration management for laekning-eventhub
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest first: built-in defaults, the YAML file, `LAEKNING_*`
//! environment variables, command-line flags.

use crate::error::{LaekningError, Result};
use anyhow::Context;
use crate::eventhub::{ConnectionString, ConsumerConfig, SecurityProtocol, StartPosition};
use crate::report::KindFilter;
use crate::secrets::{SecretClient, CONNECTION_STRING_SECRET, DEFAULT_API_VERSION, HUB_NAME_SECRET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Vault name baked in at build time, falling back to `defaultvault`.
pub const BUILD_VAULT_NAME: &str = match option_env!("KEYVAULT_NAME") {
    Some(name) => name,
    None => "defaultvault",
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the stream secrets are read from
    #[serde(default)]
    pub key_vault: KeyVaultConfig,
    /// Event hub consumer settings
    #[serde(default)]
    pub event_hub: EventHubConfig,
    /// Report output settings
    #[serde(default)]
    pub report: ReportConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVaultConfig {
    /// Vault name, expanded to `https://<name>.vault.azure.net/`
    #[serde(default = "default_vault_name")]
    pub vault_name: String,

    /// Full vault URL; takes precedence over `vault_name`
    #[serde(default)]
    pub vault_url: Option<String>,

    /// Name of the secret holding the connection string
    #[serde(default = "default_connection_string_secret")]
    pub connection_string_secret: String,

    /// Name of the secret holding the event hub name
    #[serde(default = "default_hub_name_secret")]
    pub hub_name_secret: String,

    /// Key Vault REST API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// HTTP timeout for token and secret requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl KeyVaultConfig {
    /// The vault URL to use.
    pub fn resolved_url(&self) -> String {
        self.vault_url
            .clone()
            .unwrap_or_else(|| SecretClient::vault_url_for(&self.vault_name))
    }

    /// HTTP timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            vault_name: default_vault_name(),
            vault_url: None,
            connection_string_secret: default_connection_string_secret(),
            hub_name_secret: default_hub_name_secret(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Event hub consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHubConfig {
    /// Connection string; with `hub_name` it bypasses Key Vault
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Event hub name; with `connection_string` it bypasses Key Vault
    #[serde(default)]
    pub hub_name: Option<String>,

    /// Consumer group
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Where reading starts (earliest, latest)
    #[serde(default = "default_start_position")]
    pub start_position: String,

    /// Maximum events per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest wait for the first event of a batch in milliseconds
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Longest wait for each further event of a batch in milliseconds
    #[serde(default = "default_batch_linger_ms")]
    pub batch_linger_ms: u64,

    /// Broker override, e.g. a local emulator
    #[serde(default)]
    pub brokers: Option<String>,

    /// Security protocol override (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL)
    #[serde(default)]
    pub security_protocol: Option<String>,
}

impl EventHubConfig {
    /// Connection string and hub name when both are configured locally.
    pub fn local_secrets(&self) -> Option<(&str, &str)> {
        match (&self.connection_string, &self.hub_name) {
            (Some(conn), Some(hub)) => Some((conn.as_str(), hub.as_str())),
            _ => None,
        }
    }

    /// Build the consumer configuration for a resolved connection.
    ///
    /// # Errors
    ///
    /// Returns error if the start position or security protocol is invalid
    pub fn consumer_config(
        &self,
        connection: &ConnectionString,
        hub_name: &str,
    ) -> Result<ConsumerConfig> {
        let start_position: StartPosition = self
            .start_position
            .parse()
            .map_err(|e| LaekningError::Config(format!("{}", e)))?;

        let mut config = ConsumerConfig::for_event_hub(connection, hub_name)
            .with_consumer_group(&self.consumer_group)
            .with_start_position(start_position)
            .with_batch_size(self.batch_size)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_waits(
                Duration::from_millis(self.max_wait_ms),
                Duration::from_millis(self.batch_linger_ms),
            );

        if let Some(brokers) = &self.brokers {
            config = config.with_brokers(brokers);
        }
        if let Some(protocol) = &self.security_protocol {
            let protocol: SecurityProtocol = protocol
                .parse()
                .map_err(|e| LaekningError::Config(format!("{}", e)))?;
            config = config.with_security_protocol(protocol);
        }

        Ok(config)
    }
}

impl Default for EventHubConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            hub_name: None,
            consumer_group: default_consumer_group(),
            start_position: default_start_position(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
            batch_linger_ms: default_batch_linger_ms(),
            brokers: None,
            security_protocol: None,
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Event types to report; empty reports every type
    #[serde(default)]
    pub event_types: Vec<String>,
}

impl ReportConfig {
    /// Build the kind filter.
    pub fn filter(&self) -> KindFilter {
        KindFilter::new(self.event_types.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, standard error only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Log every raw event body at debug level
    #[serde(default)]
    pub include_payload: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            include_payload: false,
        }
    }
}

fn default_vault_name() -> String {
    BUILD_VAULT_NAME.to_string()
}

fn default_connection_string_secret() -> String {
    CONNECTION_STRING_SECRET.to_string()
}

fn default_hub_name_secret() -> String {
    HUB_NAME_SECRET.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_consumer_group() -> String {
    crate::eventhub::DEFAULT_CONSUMER_GROUP.to_string()
}

fn default_start_position() -> String {
    StartPosition::Earliest.as_str().to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_wait_ms() -> u64 {
    5000
}

fn default_batch_linger_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a boolean environment value.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(LaekningError::Io)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(LaekningError::Yaml)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        // Key Vault overrides
        if let Ok(name) = std::env::var("KEYVAULT_NAME") {
            self.key_vault.vault_name = name;
        }

        if let Ok(url) = std::env::var("LAEKNING_KEYVAULT_URL") {
            self.key_vault.vault_url = Some(url);
        }

        // Event hub overrides
        if let Ok(conn) = std::env::var("LAEKNING_EVENTHUB_CONNECTION_STRING") {
            self.event_hub.connection_string = Some(conn);
        }

        if let Ok(hub) = std::env::var("LAEKNING_EVENTHUB_NAME") {
            self.event_hub.hub_name = Some(hub);
        }

        if let Ok(group) = std::env::var("LAEKNING_EVENTHUB_CONSUMER_GROUP") {
            self.event_hub.consumer_group = group;
        }

        if let Ok(position) = std::env::var("LAEKNING_EVENTHUB_START_POSITION") {
            self.event_hub.start_position = position;
        }

        if let Ok(batch_size) = std::env::var("LAEKNING_EVENTHUB_BATCH_SIZE") {
            if let Ok(value) = batch_size.parse() {
                self.event_hub.batch_size = value;
            } else {
                tracing::warn!("Invalid LAEKNING_EVENTHUB_BATCH_SIZE: {}", batch_size);
            }
        }

        if let Ok(interval) = std::env::var("LAEKNING_EVENTHUB_POLL_INTERVAL_MS") {
            if let Ok(value) = interval.parse() {
                self.event_hub.poll_interval_ms = value;
            } else {
                tracing::warn!("Invalid LAEKNING_EVENTHUB_POLL_INTERVAL_MS: {}", interval);
            }
        }

        if let Ok(brokers) = std::env::var("LAEKNING_EVENTHUB_BROKERS") {
            self.event_hub.brokers = Some(brokers);
        }

        if let Ok(protocol) = std::env::var("LAEKNING_EVENTHUB_SECURITY_PROTOCOL") {
            self.event_hub.security_protocol = Some(protocol);
        }

        // Report overrides
        if let Ok(types) = std::env::var("LAEKNING_REPORT_EVENT_TYPES") {
            self.report.event_types = types
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LAEKNING_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("LAEKNING_JSON_LOGS") {
            if let Some(value) = parse_bool(&json) {
                self.logging.json_format = value;
            } else {
                tracing::warn!("Invalid LAEKNING_JSON_LOGS: {}", json);
            }
        }

        if let Ok(file) = std::env::var("LAEKNING_LOG_FILE") {
            self.logging.file_path = Some(PathBuf::from(file));
        }

        if let Ok(payload) = std::env::var("LAEKNING_LOG_PAYLOAD") {
            if let Some(value) = parse_bool(&payload) {
                self.logging.include_payload = value;
            } else {
                tracing::warn!("Invalid LAEKNING_LOG_PAYLOAD: {}", payload);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(name) = &cli.vault_name {
            self.key_vault.vault_name = name.clone();
        }

        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if cli.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.key_vault.vault_url.is_none() && self.key_vault.vault_name.trim().is_empty() {
            return Err(LaekningError::Config(
                "key_vault.vault_name cannot be empty unless key_vault.vault_url is set"
                    .to_string(),
            )
            .into());
        }

        if self.key_vault.timeout_secs == 0 {
            return Err(LaekningError::Config(
                "key_vault.timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.event_hub.batch_size == 0 || self.event_hub.batch_size > 1000 {
            return Err(LaekningError::Config(
                "event_hub.batch_size must be between 1 and 1000".to_string(),
            )
            .into());
        }

        if self.event_hub.poll_interval_ms > 60_000 {
            return Err(LaekningError::Config(
                "event_hub.poll_interval_ms must be less than or equal to 60000".to_string(),
            )
            .into());
        }

        if self.event_hub.max_wait_ms == 0 {
            return Err(LaekningError::Config(
                "event_hub.max_wait_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if let Err(e) = self.event_hub.start_position.parse::<StartPosition>() {
            return Err(LaekningError::Config(format!("event_hub.start_position: {}", e)).into());
        }

        if let Some(protocol) = &self.event_hub.security_protocol {
            if let Err(e) = protocol.parse::<SecurityProtocol>() {
                return Err(
                    LaekningError::Config(format!("event_hub.security_protocol: {}", e)).into(),
                );
            }
        }

        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(LaekningError::Config(format!(
                "Invalid logging.level '{}': {}",
                self.logging.level, e
            ))
            .into());
        }

        Ok(())
    }
}
