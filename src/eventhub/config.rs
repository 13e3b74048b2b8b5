//! Partition consumer configuration.
//!
//! Event Hubs exposes a Kafka-compatible endpoint on port 9093 of every
//! namespace. It expects `SASL_SSL` with the `PLAIN` mechanism, the literal
//! user name `$ConnectionString` and the connection string as password.
//!
//! # Example
//!
//! ```rust
//! use laekning_eventhub::eventhub::{ConnectionString, ConsumerConfig, SecurityProtocol};
//!
//! let conn = ConnectionString::parse(
//!     "Endpoint=sb://laekning.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=c2VjcmV0",
//! ).unwrap();
//! let config = ConsumerConfig::for_event_hub(&conn, "laekning-events");
//!
//! assert_eq!(config.brokers, "laekning.servicebus.windows.net:9093");
//! assert_eq!(config.security_protocol, SecurityProtocol::SaslSsl);
//! assert_eq!(config.batch_size, 10);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::connection::ConnectionString;

/// SASL user name the Event Hubs Kafka endpoint expects.
pub const CONNECTION_STRING_USER: &str = "$ConnectionString";

/// Consumer group every event hub has.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Errors that can occur while building consumer settings.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid start position specified.
    #[error("Invalid start position: {0} (expected 'earliest' or 'latest')")]
    InvalidStartPosition(String),
}

/// Security protocol for the Kafka connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// No encryption or authentication (local emulators only).
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption (Event Hubs).
    #[default]
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the Kafka configuration string for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    /// Returns true if the protocol authenticates with SASL.
    pub fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }
}

impl FromStr for SecurityProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(s.to_string())),
        }
    }
}

/// Where reading starts in the selected partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartPosition {
    /// The earliest retained event, inclusive.
    #[default]
    Earliest,
    /// Only events enqueued after the consumer starts.
    Latest,
}

impl StartPosition {
    /// Returns the configuration string for this position.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl FromStr for StartPosition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            _ => Err(ConfigError::InvalidStartPosition(s.to_string())),
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SASL/PLAIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SaslPlain {
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

impl fmt::Debug for SaslPlain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslPlain")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration of the single-partition consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka bootstrap addresses (comma-separated).
    pub brokers: String,

    /// Event hub to read (the Kafka topic).
    pub hub_name: String,

    /// Consumer group; offsets are never committed to it.
    pub consumer_group: String,

    /// Client identifier reported to the broker.
    pub client_id: String,

    /// Security protocol for the connection.
    pub security_protocol: SecurityProtocol,

    /// SASL credentials (required for SASL protocols).
    pub sasl: Option<SaslPlain>,

    /// Where reading starts.
    pub start_position: StartPosition,

    /// Maximum events per poll.
    pub batch_size: usize,

    /// Longest wait for the first event of a batch.
    pub max_wait: Duration,

    /// Longest wait for each further event once a batch has started.
    pub batch_linger: Duration,

    /// Idle delay between polls.
    pub poll_interval: Duration,

    /// Broker session timeout.
    pub session_timeout: Duration,

    /// Timeout for partition discovery.
    pub metadata_timeout: Duration,
}

impl ConsumerConfig {
    /// Creates a configuration with defaults and no authentication.
    ///
    /// # Example
    ///
    /// ```rust
    /// use laekning_eventhub::eventhub::{ConsumerConfig, StartPosition};
    ///
    /// let config = ConsumerConfig::new("localhost:9092", "events");
    /// assert_eq!(config.consumer_group, "$Default");
    /// assert_eq!(config.start_position, StartPosition::Earliest);
    /// ```
    pub fn new(brokers: &str, hub_name: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
            hub_name: hub_name.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            client_id: format!("laekning-eventhub-{}", hub_name),
            security_protocol: SecurityProtocol::Plaintext,
            sasl: None,
            start_position: StartPosition::default(),
            batch_size: 10,
            max_wait: Duration::from_secs(5),
            batch_linger: Duration::from_millis(50),
            poll_interval: Duration::from_millis(500),
            session_timeout: Duration::from_secs(30),
            metadata_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration for an Event Hubs namespace.
    ///
    /// Uses the namespace's Kafka endpoint with `SASL_SSL`/`PLAIN`
    /// authentication based on the connection string.
    pub fn for_event_hub(connection: &ConnectionString, hub_name: &str) -> Self {
        let mut config = Self::new(&connection.kafka_bootstrap(), hub_name);
        config.security_protocol = SecurityProtocol::SaslSsl;
        config.sasl = Some(SaslPlain {
            username: CONNECTION_STRING_USER.to_string(),
            password: connection.as_str().to_string(),
        });
        config
    }

    /// Sets the consumer group.
    pub fn with_consumer_group(mut self, group: &str) -> Self {
        self.consumer_group = group.to_string();
        self
    }

    /// Sets where reading starts.
    pub fn with_start_position(mut self, position: StartPosition) -> Self {
        self.start_position = position;
        self
    }

    /// Sets the maximum events per poll.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the idle delay between polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the batch waits.
    pub fn with_waits(mut self, max_wait: Duration, batch_linger: Duration) -> Self {
        self.max_wait = max_wait;
        self.batch_linger = batch_linger;
        self
    }

    /// Points the consumer at other brokers, e.g. a local emulator.
    pub fn with_brokers(mut self, brokers: &str) -> Self {
        self.brokers = brokers.to_string();
        self
    }

    /// Overrides the security protocol.
    ///
    /// Switching to a protocol without SASL drops the SASL credentials.
    pub fn with_security_protocol(mut self, protocol: SecurityProtocol) -> Self {
        self.security_protocol = protocol;
        if !protocol.uses_sasl() {
            self.sasl = None;
        }
        self
    }

    /// Returns the Kafka client settings as key-value pairs.
    ///
    /// Auto commit is always disabled: the consumer never records its
    /// position.
    pub fn client_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            ("group.id".to_string(), self.consumer_group.clone()),
            ("client.id".to_string(), self.client_id.clone()),
            ("enable.auto.commit".to_string(), "false".to_string()),
            ("enable.partition.eof".to_string(), "false".to_string()),
            (
                "auto.offset.reset".to_string(),
                self.start_position.as_str().to_string(),
            ),
            (
                "session.timeout.ms".to_string(),
                self.session_timeout.as_millis().to_string(),
            ),
            ("request.timeout.ms".to_string(), "60000".to_string()),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl {
            settings.push(("sasl.mechanism".to_string(), "PLAIN".to_string()));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        settings
    }
}
