//! Queue transport: thin wrapper around the AMQP broker
//!
//! Provides durable named queues and publish/consume primitives shared by
//! the backend and the AI worker. Both sides declare the queues idempotently
//! before use, since service start order is not guaranteed.
//!
//! Queue names are configuration, not a hardcoded contract; the two ends of
//! a deployment must simply agree. Declaring an existing queue with
//! conflicting durability is a broker precondition failure and surfaces as
//! an error from [`declare_queues`] rather than silently degrading.

use lapin::{
    options::{BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::Result;

/// AMQP delivery mode for messages that survive a broker restart
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Header carrying the number of processing attempts already made
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Header describing why a message was dead-lettered
pub const FAILURE_REASON_HEADER: &str = "x-failure-reason";

/// Broker connection and queue topology configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// AMQP connection URL
    pub url: String,
    /// Backend → worker job queue
    pub jobs_queue: String,
    /// Worker → backend result queue
    pub results_queue: String,
    /// Parking queue for unprocessable messages
    pub dead_letter_queue: String,
    /// Per-channel unacked message limit
    pub prefetch: u16,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "amqp://127.0.0.1:5672/%2f".to_string(),
            jobs_queue: "viva.jobs".to_string(),
            results_queue: "viva.results".to_string(),
            dead_letter_queue: "viva.jobs.dead".to_string(),
            prefetch: 1,
            reconnect_delay_secs: 5,
        }
    }
}

impl BrokerConfig {
    /// Apply environment variable overrides (env wins over file values)
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = crate::config::env_string("VIVA_AMQP_URL") {
            self.url = url;
        }
        if let Some(name) = crate::config::env_string("VIVA_JOBS_QUEUE") {
            self.jobs_queue = name;
        }
        if let Some(name) = crate::config::env_string("VIVA_RESULTS_QUEUE") {
            self.results_queue = name;
        }
        if let Some(name) = crate::config::env_string("VIVA_DEAD_LETTER_QUEUE") {
            self.dead_letter_queue = name;
        }
        if let Some(n) = crate::config::env_parse("VIVA_PREFETCH") {
            self.prefetch = n;
        }
        if let Some(n) = crate::config::env_parse("VIVA_RECONNECT_DELAY_SECS") {
            self.reconnect_delay_secs = n;
        }
    }

    /// Delay between reconnect attempts as a [`Duration`]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Owned broker connection, established once per service and reused
pub struct Broker {
    connection: Connection,
    config: BrokerConfig,
}

impl Broker {
    /// Single connection attempt
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
        Ok(Self {
            connection,
            config: config.clone(),
        })
    }

    /// Connect, retrying on a fixed delay until the broker is reachable.
    ///
    /// Long-running daemons must survive broker restarts and late starts,
    /// so this never gives up.
    pub async fn connect_with_retry(config: &BrokerConfig) -> Self {
        loop {
            match Self::connect(config).await {
                Ok(broker) => {
                    info!(url = %config.url, "Connected to message broker");
                    return broker;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = config.reconnect_delay_secs,
                        "Broker unreachable, will retry"
                    );
                    tokio::time::sleep(config.reconnect_delay()).await;
                }
            }
        }
    }

    /// Open a channel with the configured prefetch applied
    pub async fn open_channel(&self) -> Result<Channel> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await?;
        Ok(channel)
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

/// Declare the jobs, results and dead-letter queues (durable, create-if-absent).
///
/// A declare failure — including a durability mismatch against an existing
/// queue — is a configuration error and must abort startup.
pub async fn declare_queues(channel: &Channel, config: &BrokerConfig) -> Result<()> {
    for name in [
        &config.jobs_queue,
        &config.results_queue,
        &config.dead_letter_queue,
    ] {
        channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
    }
    Ok(())
}

/// Publish a persistent message to a named queue (default exchange)
pub async fn publish(channel: &Channel, queue: &str, payload: &[u8]) -> Result<()> {
    channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default().with_delivery_mode(DELIVERY_MODE_PERSISTENT),
        )
        .await?;
    Ok(())
}

/// Publish a persistent message with explicit headers
pub async fn publish_with_headers(
    channel: &Channel,
    queue: &str,
    payload: &[u8],
    headers: FieldTable,
) -> Result<()> {
    channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default()
                .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
                .with_headers(headers),
        )
        .await?;
    Ok(())
}

/// Start a manual-ack consumer on a named queue
pub async fn consume(channel: &Channel, queue: &str, consumer_tag: &str) -> Result<Consumer> {
    let consumer = channel
        .basic_consume(
            queue,
            consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(consumer)
}

/// Read the retry count header from delivery properties (0 when absent)
pub fn delivery_retry_count(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|table| table.inner().get(&ShortString::from(RETRY_COUNT_HEADER)))
        .and_then(|value| match value {
            AMQPValue::LongInt(n) => Some(*n as u32),
            AMQPValue::LongLongInt(n) => Some(*n as u32),
            AMQPValue::ShortShortInt(n) => Some(*n as u32),
            _ => None,
        })
        .unwrap_or(0)
}

/// Build headers carrying a retry count
pub fn retry_headers(retry_count: u32) -> FieldTable {
    let mut table = FieldTable::default();
    table.insert(
        ShortString::from(RETRY_COUNT_HEADER),
        AMQPValue::LongInt(retry_count as i32),
    );
    table
}

/// Build headers for a dead-lettered message
pub fn dead_letter_headers(retry_count: u32, reason: &str) -> FieldTable {
    let mut table = retry_headers(retry_count);
    table.insert(
        ShortString::from(FAILURE_REASON_HEADER),
        AMQPValue::LongString(reason.into()),
    );
    table
}
