//! The `listen` command: resolve secrets, open the partition, report events.
//!
//! Startup failures (secrets, configuration, connection) end the command
//! before the first poll. Once polling, a source error ends it as well;
//! malformed events never do.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LaekningError, Result};
use crate::eventhub::{ConnectionString, EventSource, PartitionConsumer, StartPosition};
use crate::report::{ReportStats, Reporter};
use crate::secrets::{
    resolve_stream_secrets, ChainedTokenCredential, SecretClient, SecretError, StreamSecrets,
};

/// Poll loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum events requested per poll.
    pub batch_size: usize,
    /// Delay after each poll.
    pub poll_interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Poll `source` and report every event until `shutdown` resolves.
///
/// Each iteration requests one batch, reports its events in order, then
/// sleeps for the poll interval. Shutdown is honoured while waiting for a
/// batch or sleeping, never in the middle of a batch.
///
/// # Errors
///
/// Returns error if the source fails or a report sink cannot be written
pub async fn poll_loop<S, O, E, F>(
    source: &mut S,
    reporter: &mut Reporter<O, E>,
    options: PollOptions,
    shutdown: F,
) -> Result<ReportStats>
where
    S: EventSource + ?Sized,
    O: Write,
    E: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let batch = tokio::select! {
            _ = &mut shutdown => break,
            batch = source.receive_events(options.batch_size) => batch
                .map_err(|e| LaekningError::Consumer(e.to_string()))?,
        };

        if !batch.is_empty() {
            for event in &batch {
                reporter.report(&event.body)?;
            }
            let stats = reporter.stats();
            debug!(
                batch = batch.len(),
                last_offset = batch.last().map(|e| e.offset),
                reported = stats.reported,
                skipped = stats.skipped,
                failed = stats.failed,
                "Processed batch"
            );
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }

    let stats = reporter.stats();
    info!(
        reported = stats.reported,
        skipped = stats.skipped,
        failed = stats.failed,
        "Stopped listening"
    );
    Ok(stats)
}

/// Obtain the connection string and hub name.
///
/// Locally configured values are used as-is; otherwise both are read from
/// Key Vault. Each path prints its own one-line failure notice.
async fn resolve_secrets(config: &Config) -> std::result::Result<StreamSecrets, LaekningError> {
    let vault = &config.key_vault;

    if let Some((connection_string, hub_name)) = config.event_hub.local_secrets() {
        info!("Using event hub secrets from configuration; Key Vault not contacted");
        return StreamSecrets::new(
            connection_string,
            hub_name,
            &vault.connection_string_secret,
            &vault.hub_name_secret,
        )
        .map_err(|e| {
            eprintln!("Invalid event hub settings in configuration.");
            LaekningError::Secret(e.to_string())
        });
    }

    fetch_from_key_vault(config).await.map_err(|e| {
        eprintln!("Failed to fetch secrets from Key Vault.");
        match e {
            SecretError::Credential(e) => LaekningError::Credential(e.to_string()),
            e => LaekningError::Secret(e.to_string()),
        }
    })
}

async fn fetch_from_key_vault(config: &Config) -> std::result::Result<StreamSecrets, SecretError> {
    let vault = &config.key_vault;
    let credential = ChainedTokenCredential::from_env(vault.timeout())?;
    debug!(credentials = ?credential.names(), "Credential chain");

    let client = SecretClient::new(&vault.resolved_url(), Arc::new(credential), vault.timeout())?
        .with_api_version(&vault.api_version);
    info!(vault = %client.vault_url(), "Fetching stream secrets from Key Vault");

    resolve_stream_secrets(
        &client,
        &vault.connection_string_secret,
        &vault.hub_name_secret,
    )
    .await
}

/// Run the listen command until `shutdown` resolves.
///
/// # Errors
///
/// Returns error on any startup failure or if the stream fails while polling
pub async fn run_listen<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let secrets = resolve_secrets(&config).await?;

    let connection = ConnectionString::parse(&secrets.connection_string)
        .map_err(|e| LaekningError::Connection(e.to_string()))?;
    connection
        .ensure_entity(&secrets.hub_name)
        .map_err(|e| LaekningError::Connection(e.to_string()))?;

    let consumer_config = config
        .event_hub
        .consumer_config(&connection, &secrets.hub_name)?;
    let options = PollOptions {
        batch_size: consumer_config.batch_size,
        poll_interval: consumer_config.poll_interval,
    };
    let start_position = consumer_config.start_position;

    // Partition discovery blocks on a metadata request.
    let mut consumer =
        tokio::task::spawn_blocking(move || PartitionConsumer::connect(&consumer_config))
            .await
            .map_err(|e| LaekningError::Consumer(e.to_string()))?
            .map_err(|e| LaekningError::Consumer(e.to_string()))?;

    println!("Connected to Event Hub: {}", consumer.hub_name());
    println!("Listening for events on Event Hub: {}", consumer.hub_name());
    info!(
        hub = %consumer.hub_name(),
        partition = consumer.partition(),
        start_position = %start_position,
        "Consuming partition"
    );

    let filter = config.report.filter();
    if !filter.is_pass_through() {
        info!(filter = %filter.summary(), "Reporting a subset of event types");
    }
    if start_position == StartPosition::Earliest {
        warn!("Reading from the earliest retained event; past events will be reported again");
    }

    let mut reporter = Reporter::stdio()
        .with_filter(filter)
        .with_payload_logging(config.logging.include_payload);

    poll_loop(&mut consumer, &mut reporter, options, shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventhub::{ConsumerError, RawEvent};
    use async_trait::async_trait;

    struct Batches(Vec<Vec<RawEvent>>);

    #[async_trait]
    impl EventSource for Batches {
        async fn receive_events(
            &mut self,
            _max: usize,
        ) -> std::result::Result<Vec<RawEvent>, ConsumerError> {
            if self.0.is_empty() {
                std::future::pending::<()>().await;
            }
            Ok(self.0.remove(0))
        }
    }

    fn options() -> PollOptions {
        PollOptions {
            batch_size: 10,
            poll_interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_poll_options_default() {
        let options = PollOptions::default();
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.poll_interval, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_poll_loop_stops_on_shutdown() {
        let mut source = Batches(vec![vec![RawEvent::from_body(
            r#"{"EventType":"OrderPlaced","OrderId":"O1"}"#,
        )]]);
        let mut reporter = Reporter::new(Vec::new(), Vec::new());

        let stats = poll_loop(
            &mut source,
            &mut reporter,
            options(),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert_eq!(stats.reported, 1);
    }

    #[tokio::test]
    async fn test_local_secrets_reject_empty_hub_name() {
        let mut config = Config::default();
        config.event_hub.connection_string =
            Some("Endpoint=sb://ns.servicebus.windows.net/".to_string());
        config.event_hub.hub_name = Some("  ".to_string());

        let err = resolve_secrets(&config).await.unwrap_err();
        assert!(matches!(err, LaekningError::Secret(_)));
        assert_eq!(err.to_string(), "Secret error: Secret 'EventHubName' is empty");
    }

    #[tokio::test]
    async fn test_run_listen_rejects_mismatched_entity_path() {
        let mut config = Config::default();
        config.event_hub.connection_string = Some(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=k;SharedAccessKey=v;EntityPath=orders"
                .to_string(),
        );
        config.event_hub.hub_name = Some("prescriptions".to_string());

        let err = run_listen(config, std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("scoped to event hub 'orders'"));
    }

    #[tokio::test]
    async fn test_run_listen_rejects_bad_connection_string() {
        let mut config = Config::default();
        config.event_hub.connection_string = Some("SharedAccessKey=v".to_string());
        config.event_hub.hub_name = Some("prescriptions".to_string());

        let err = run_listen(config, std::future::pending()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Connection error: connection string has no Endpoint"
        );
    }
}
