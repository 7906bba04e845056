//! Result dispatcher: consumes the results queue and persists outcomes
//!
//! Correlates each result to its owning submission or rubric by uuid,
//! persists the generated content together with the COMPLETE transition in
//! one transaction, and only then acknowledges the delivery. Malformed or
//! orphaned results are acknowledged with an audit log entry; redelivery
//! could never fix them. Persistence failures are requeued so results are
//! not lost.

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use viva_common::message::{ResultMessage, ResultPayload};
use viva_common::queue::{self, Broker, BrokerConfig};
use viva_common::Result;

use crate::db;

/// What the consume loop should do with a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
}

/// Backend-side result handler
pub struct Dispatcher {
    db: SqlitePool,
}

impl Dispatcher {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Handle one raw result body and decide the delivery's fate.
    ///
    /// Never returns an error: every failure mode maps to an ack (drop with
    /// audit trail) or a requeue, keeping the consume loop alive.
    pub async fn handle_result(&self, body: &[u8]) -> Disposition {
        let message = match ResultMessage::from_bytes(body) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Dropping malformed result message");
                return Disposition::Ack;
            }
        };

        match self.apply(&message).await {
            Ok(true) => {
                info!(uuid = %message.uuid, "Result persisted");
                Disposition::Ack
            }
            Ok(false) => {
                warn!(uuid = %message.uuid, "Ignoring result with unknown or stale uuid");
                Disposition::Ack
            }
            Err(e) => {
                error!(uuid = %message.uuid, error = %e, "Failed to persist result, requeueing");
                Disposition::Requeue
            }
        }
    }

    /// Persist the generated content. Returns false when the uuid does not
    /// correlate to any known row.
    async fn apply(&self, message: &ResultMessage) -> Result<bool> {
        match &message.payload {
            ResultPayload::VivaQuestions(questions) => {
                if db::submissions::get_submission(&self.db, &message.uuid)
                    .await?
                    .is_none()
                {
                    return Ok(false);
                }
                db::questions::complete_submission(&self.db, &message.uuid, questions).await?;
                Ok(true)
            }
            ResultPayload::CreateRubric(body) => {
                if db::rubrics::get_rubric(&self.db, &message.uuid).await?.is_none() {
                    return Ok(false);
                }
                db::rubrics::complete_rubric(&self.db, &message.uuid, body).await?;
                Ok(true)
            }
        }
    }
}

/// Long-running consume loop over the results queue.
///
/// Re-establishes the broker connection on a fixed delay after any
/// connection-level failure; the daemon never terminates because the broker
/// went away.
pub async fn run(db: SqlitePool, config: BrokerConfig) {
    loop {
        let broker = Broker::connect_with_retry(&config).await;

        match consume_until_disconnect(&db, &broker, &config).await {
            Ok(()) => warn!("Result consumer stream ended"),
            Err(e) => warn!(error = %e, "Result consumer failed"),
        }

        warn!(
            retry_in_secs = config.reconnect_delay_secs,
            "Reconnecting result consumer"
        );
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}

async fn consume_until_disconnect(
    db: &SqlitePool,
    broker: &Broker,
    config: &BrokerConfig,
) -> Result<()> {
    let channel = broker.open_channel().await?;
    queue::declare_queues(&channel, config).await?;

    let mut consumer = queue::consume(&channel, &config.results_queue, "viva-server-dispatcher").await?;
    let dispatcher = Dispatcher::new(db.clone());

    info!(queue = %config.results_queue, "Result dispatcher consuming");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;

        match dispatcher.handle_result(&delivery.data).await {
            Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
            Disposition::Requeue => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?
            }
        }
    }

    Ok(())
}
