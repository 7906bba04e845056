//! Job consume loop
//!
//! Per-message state machine: decode, dispatch to the generator, publish
//! the result, then ack. Acknowledgment always happens after the result
//! publish so a crash between the two can only cause duplicate processing,
//! which the backend dispatcher absorbs via uuid idempotency.
//!
//! Failed generations are retried a bounded number of times by
//! republishing the job with an incremented `x-retry-count` header after a
//! growing delay, then parked on the dead-letter queue. Redelivery is never
//! an immediate-requeue spin.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use lapin::Channel;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use viva_common::message::{JobMessage, JobPayload, ResultMessage, ResultPayload};
use viva_common::queue::{self, Broker, BrokerConfig};
use viva_common::Result;

use crate::config::WorkerConfig;
use crate::generator::{GenerationError, Generator};

/// Outcome of one job handling pass; in every case the original delivery is
/// acknowledged by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Result published to the results queue
    Completed,
    /// Republished to the jobs queue for another attempt
    Retried,
    /// Retry bound reached; parked on the dead-letter queue
    DeadLettered,
    /// Malformed message; parked on the dead-letter queue
    Rejected,
}

/// Bounded retry policy for failed generations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `base_delay * n`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Publishing seam for the consume loop
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn publish_result(&self, message: &ResultMessage) -> Result<()>;
    async fn requeue_job(&self, raw: &[u8], retry_count: u32) -> Result<()>;
    async fn dead_letter(&self, raw: &[u8], retry_count: u32, reason: &str) -> Result<()>;
}

/// Production outbox backed by an AMQP channel
pub struct AmqpOutbox {
    channel: Channel,
    config: BrokerConfig,
}

impl AmqpOutbox {
    pub fn new(channel: Channel, config: BrokerConfig) -> Self {
        Self { channel, config }
    }
}

#[async_trait]
impl Outbox for AmqpOutbox {
    async fn publish_result(&self, message: &ResultMessage) -> Result<()> {
        let payload = message.to_bytes()?;
        queue::publish(&self.channel, &self.config.results_queue, &payload).await
    }

    async fn requeue_job(&self, raw: &[u8], retry_count: u32) -> Result<()> {
        queue::publish_with_headers(
            &self.channel,
            &self.config.jobs_queue,
            raw,
            queue::retry_headers(retry_count),
        )
        .await
    }

    async fn dead_letter(&self, raw: &[u8], retry_count: u32, reason: &str) -> Result<()> {
        queue::publish_with_headers(
            &self.channel,
            &self.config.dead_letter_queue,
            raw,
            queue::dead_letter_headers(retry_count, reason),
        )
        .await
    }
}

/// AI-side job processor
pub struct Worker {
    generator: Arc<dyn Generator>,
    outbox: Arc<dyn Outbox>,
    policy: RetryPolicy,
    generation_timeout: Duration,
}

impl Worker {
    pub fn new(
        generator: Arc<dyn Generator>,
        outbox: Arc<dyn Outbox>,
        policy: RetryPolicy,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            outbox,
            policy,
            generation_timeout,
        }
    }

    /// Process one delivery. `retry_count` is the number of attempts already
    /// made (from the `x-retry-count` header).
    ///
    /// An error return means the outbox itself failed; the caller must leave
    /// the delivery unacked so the broker redelivers it.
    pub async fn handle_job(&self, raw: &[u8], retry_count: u32) -> Result<JobOutcome> {
        let message = match JobMessage::from_bytes(raw) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Dead-lettering malformed job message");
                self.outbox
                    .dead_letter(raw, retry_count, "malformed job message")
                    .await?;
                return Ok(JobOutcome::Rejected);
            }
        };

        let attempt = retry_count + 1;
        info!(uuid = %message.uuid, attempt, "Processing job");

        match self.generate(&message).await {
            Ok(payload) => {
                let result = ResultMessage {
                    uuid: message.uuid.clone(),
                    payload,
                };
                self.outbox.publish_result(&result).await?;
                info!(uuid = %message.uuid, "Result published");
                Ok(JobOutcome::Completed)
            }
            Err(e) if attempt >= self.policy.max_attempts => {
                error!(
                    uuid = %message.uuid,
                    attempt,
                    error = %e,
                    "Retry bound reached, dead-lettering job"
                );
                self.outbox
                    .dead_letter(raw, retry_count, &e.to_string())
                    .await?;
                Ok(JobOutcome::DeadLettered)
            }
            Err(e) => {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    uuid = %message.uuid,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Generation failed, scheduling retry"
                );
                tokio::time::sleep(delay).await;
                self.outbox.requeue_job(raw, retry_count + 1).await?;
                Ok(JobOutcome::Retried)
            }
        }
    }

    /// Dispatch by payload variant under the generation timeout
    async fn generate(&self, message: &JobMessage) -> std::result::Result<ResultPayload, GenerationError> {
        let generation = async {
            match &message.payload {
                JobPayload::VivaQuestions(job) => self
                    .generator
                    .generate_questions(&job.submission, job.custom_prompt.as_deref())
                    .await
                    .map(ResultPayload::VivaQuestions),
                JobPayload::CreateRubric(request) => self
                    .generator
                    .generate_rubric(request)
                    .await
                    .map(ResultPayload::CreateRubric),
            }
        };

        match tokio::time::timeout(self.generation_timeout, generation).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.generation_timeout)),
        }
    }
}

/// Long-running consume loop over the jobs queue.
///
/// Re-establishes the broker connection on a fixed delay after any
/// connection-level failure; the daemon never terminates because the broker
/// went away.
pub async fn run(generator: Arc<dyn Generator>, config: WorkerConfig) {
    loop {
        let broker = Broker::connect_with_retry(&config.broker).await;

        match consume_until_disconnect(generator.clone(), &broker, &config).await {
            Ok(()) => warn!("Job consumer stream ended"),
            Err(e) => warn!(error = %e, "Job consumer failed"),
        }

        warn!(
            retry_in_secs = config.broker.reconnect_delay_secs,
            "Reconnecting job consumer"
        );
        tokio::time::sleep(config.broker.reconnect_delay()).await;
    }
}

async fn consume_until_disconnect(
    generator: Arc<dyn Generator>,
    broker: &Broker,
    config: &WorkerConfig,
) -> Result<()> {
    let channel = broker.open_channel().await?;
    queue::declare_queues(&channel, &config.broker).await?;

    let outbox = Arc::new(AmqpOutbox::new(channel.clone(), config.broker.clone()));
    let worker = Worker::new(
        generator,
        outbox,
        config.retry_policy(),
        config.generation_timeout(),
    );

    let mut consumer = queue::consume(&channel, &config.broker.jobs_queue, "viva-worker").await?;

    info!(queue = %config.broker.jobs_queue, "Worker consuming jobs");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let retry_count = queue::delivery_retry_count(&delivery.properties);

        match worker.handle_job(&delivery.data, retry_count).await {
            Ok(_) => delivery.ack(BasicAckOptions::default()).await?,
            Err(e) => {
                error!(error = %e, "Job handling failed before ack, returning message to queue");
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
    }
}
