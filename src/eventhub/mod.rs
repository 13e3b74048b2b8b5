//! Event Hubs stream access
//!
//! # Modules
//!
//! - [`connection`]: connection string parsing
//! - [`config`]: consumer configuration and Kafka client settings
//! - [`consumer`]: the [`EventSource`] trait and the partition consumer

pub mod config;
pub mod connection;
pub mod consumer;

pub use config::{
    ConfigError, ConsumerConfig, SaslPlain, SecurityProtocol, StartPosition,
    CONNECTION_STRING_USER, DEFAULT_CONSUMER_GROUP,
};
pub use connection::{ConnectionString, ConnectionStringError, KAFKA_PORT};
pub use consumer::{ConsumerError, EventSource, PartitionConsumer, RawEvent};
