//! Single-partition event consumer.
//!
//! [`PartitionConsumer`] reads one partition of an event hub through the
//! Event Hubs Kafka endpoint. It is deliberately narrow: it discovers the
//! hub's partitions, assigns itself to the first one at the configured start
//! position, and hands out batches of raw bodies. Offsets are never
//! committed.
//!
//! Anything implementing [`EventSource`] can drive the listen loop, which is
//! how the loop is exercised in tests without a broker.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConsumerConfig, StartPosition};

/// Errors that can occur during consumer operations.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Error from the Kafka client.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The hub is not listed in the broker metadata.
    #[error("Event hub '{0}' not found")]
    HubNotFound(String),

    /// The hub has no partitions.
    #[error("Event hub '{0}' has no partitions")]
    NoPartitions(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// One event body as delivered by the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event body; empty when the record carried no payload.
    pub body: Vec<u8>,
    /// Partition the event was read from.
    pub partition: i32,
    /// Offset of the event within its partition.
    pub offset: i64,
}

impl RawEvent {
    /// Create an event with no position information.
    pub fn from_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            partition: 0,
            offset: -1,
        }
    }
}

/// A source of raw event batches.
///
/// # Example
///
/// ```rust
/// use laekning_eventhub::eventhub::{ConsumerError, EventSource, RawEvent};
///
/// struct Fixed(Vec<RawEvent>);
///
/// #[async_trait::async_trait]
/// impl EventSource for Fixed {
///     async fn receive_events(&mut self, max: usize) -> Result<Vec<RawEvent>, ConsumerError> {
///         let n = max.min(self.0.len());
///         Ok(self.0.drain(..n).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait EventSource: Send {
    /// Wait for up to `max` events.
    ///
    /// Returns an empty batch when the source's bounded wait elapses with
    /// nothing to deliver.
    async fn receive_events(&mut self, max: usize) -> Result<Vec<RawEvent>, ConsumerError>;
}

/// Consumer bound to the first partition of an event hub.
pub struct PartitionConsumer {
    consumer: StreamConsumer,
    hub_name: String,
    partition: i32,
    max_wait: Duration,
    batch_linger: Duration,
}

impl PartitionConsumer {
    /// Creates the consumer and assigns it to the hub's first partition.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerError::Kafka` if the client cannot be created or the
    /// metadata request fails, and `ConsumerError::HubNotFound` or
    /// `ConsumerError::NoPartitions` if there is no partition to read.
    pub fn connect(config: &ConsumerConfig) -> Result<Self, ConsumerError> {
        if config.hub_name.is_empty() {
            return Err(ConsumerError::Config("event hub name is empty".to_string()));
        }

        info!(
            brokers = %config.brokers,
            hub = %config.hub_name,
            consumer_group = %config.consumer_group,
            security_protocol = %config.security_protocol.as_str(),
            "Creating partition consumer"
        );

        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_settings() {
            client_config.set(key, value);
        }
        let consumer: StreamConsumer = client_config.create()?;

        let partition = first_partition(&consumer, &config.hub_name, config.metadata_timeout)?;

        let offset = match config.start_position {
            StartPosition::Earliest => Offset::Beginning,
            StartPosition::Latest => Offset::End,
        };
        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset(&config.hub_name, partition, offset)?;
        consumer.assign(&assignment)?;

        info!(
            hub = %config.hub_name,
            partition,
            start_position = %config.start_position,
            "Assigned to partition"
        );

        Ok(Self {
            consumer,
            hub_name: config.hub_name.clone(),
            partition,
            max_wait: config.max_wait,
            batch_linger: config.batch_linger,
        })
    }

    /// The event hub being read.
    pub fn hub_name(&self) -> &str {
        &self.hub_name
    }

    /// The partition being read.
    pub fn partition(&self) -> i32 {
        self.partition
    }
}

fn first_partition(
    consumer: &StreamConsumer,
    hub_name: &str,
    timeout: Duration,
) -> Result<i32, ConsumerError> {
    let metadata = consumer.fetch_metadata(Some(hub_name), timeout)?;
    let topic = metadata
        .topics()
        .iter()
        .find(|t| t.name() == hub_name)
        .ok_or_else(|| ConsumerError::HubNotFound(hub_name.to_string()))?;

    if let Some(err) = topic.error() {
        return Err(ConsumerError::Config(format!(
            "metadata for '{}' reported {:?}",
            hub_name, err
        )));
    }

    let ids: Vec<i32> = topic.partitions().iter().map(|p| p.id()).collect();
    debug!(hub = %hub_name, partitions = ?ids, "Discovered partitions");

    ids.first()
        .copied()
        .ok_or_else(|| ConsumerError::NoPartitions(hub_name.to_string()))
}

#[async_trait]
impl EventSource for PartitionConsumer {
    async fn receive_events(&mut self, max: usize) -> Result<Vec<RawEvent>, ConsumerError> {
        let mut events = Vec::with_capacity(max);
        let mut wait = self.max_wait;

        while events.len() < max {
            match tokio::time::timeout(wait, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Err(e)) => return Err(ConsumerError::Kafka(e)),
                Ok(Ok(message)) => {
                    events.push(RawEvent {
                        body: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                        partition: message.partition(),
                        offset: message.offset(),
                    });
                    wait = self.batch_linger;
                }
            }
        }

        Ok(events)
    }
}
