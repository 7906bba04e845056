//! Producer: the submit path of the pipeline
//!
//! Turns a persisted submission or rubric-creation request into a job
//! message, marks the row INPROGRESS, and publishes to the jobs queue. The
//! correlation uuid of every job is the owning row's own id, so results can
//! be matched back without any extra bookkeeping and redelivery stays
//! idempotent at the dispatcher.
//!
//! Failed submits are terminal: the row is marked ERROR and retries are a
//! caller-initiated re-submit, never automatic.

use async_trait::async_trait;
use lapin::Channel;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info};
use viva_common::message::{JobMessage, JobPayload, RubricRequest, VivaQuestionsJob};
use viva_common::{queue, Error, Result};

use crate::db::{self, VivaStatus};

/// Publisher seam for the jobs queue
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish_job(&self, message: &JobMessage) -> Result<()>;
}

/// Production publisher backed by an AMQP channel
pub struct AmqpJobPublisher {
    channel: Channel,
    queue_name: String,
}

impl AmqpJobPublisher {
    pub fn new(channel: Channel, queue_name: String) -> Self {
        Self {
            channel,
            queue_name,
        }
    }
}

#[async_trait]
impl JobPublisher for AmqpJobPublisher {
    async fn publish_job(&self, message: &JobMessage) -> Result<()> {
        let payload = message.to_bytes()?;
        queue::publish(&self.channel, &self.queue_name, &payload).await
    }
}

/// Submit-path producer
pub struct Producer {
    db: SqlitePool,
    publisher: Arc<dyn JobPublisher>,
}

impl Producer {
    pub fn new(db: SqlitePool, publisher: Arc<dyn JobPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Enqueue viva question generation for a submission.
    ///
    /// Leaves the submission in exactly one of INPROGRESS (job published) or
    /// ERROR (precondition or publish failure). A submission already
    /// INPROGRESS is rejected with `Conflict` without touching its status,
    /// so at most one job per id is ever in flight.
    pub async fn submit_submission(&self, submission_id: &str) -> Result<()> {
        let submission = db::submissions::get_submission(&self.db, submission_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("submission {}", submission_id)))?;

        if submission.viva_status == VivaStatus::InProgress {
            return Err(Error::Conflict(format!(
                "viva generation already in progress for submission {}",
                submission_id
            )));
        }

        let text = match submission.extracted_text {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                db::submissions::set_viva_status(&self.db, submission_id, VivaStatus::Error)
                    .await?;
                return Err(Error::MissingContent(format!(
                    "submission {} has no extracted text",
                    submission_id
                )));
            }
        };

        // Status flips before the publish: a crash between the two leaves an
        // operator-visible INPROGRESS stall, never a stuck PENDING.
        db::submissions::set_viva_status(&self.db, submission_id, VivaStatus::InProgress).await?;

        let message = JobMessage {
            uuid: submission_id.to_string(),
            request_type: None,
            payload: JobPayload::VivaQuestions(VivaQuestionsJob {
                submission: text,
                custom_prompt: submission.custom_prompt,
            }),
        };

        if let Err(e) = self.publisher.publish_job(&message).await {
            error!(submission_id, error = %e, "Failed to enqueue viva question job");
            db::submissions::set_viva_status(&self.db, submission_id, VivaStatus::Error).await?;
            return Err(e);
        }

        info!(submission_id, "Enqueued viva question job");
        Ok(())
    }

    /// Enqueue rubric generation, keyed by the rubric's own id.
    ///
    /// Same publish-or-mark-error contract as [`submit_submission`].
    ///
    /// [`submit_submission`]: Producer::submit_submission
    pub async fn submit_rubric(&self, request: RubricRequest) -> Result<()> {
        let rubric_id = request.id.clone();

        let rubric = db::rubrics::get_rubric(&self.db, &rubric_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rubric {}", rubric_id)))?;

        if rubric.status == VivaStatus::InProgress {
            return Err(Error::Conflict(format!(
                "rubric generation already in progress for rubric {}",
                rubric_id
            )));
        }

        db::rubrics::set_rubric_status(&self.db, &rubric_id, VivaStatus::InProgress).await?;

        let message = JobMessage {
            uuid: rubric_id.clone(),
            request_type: None,
            payload: JobPayload::CreateRubric(request),
        };

        if let Err(e) = self.publisher.publish_job(&message).await {
            error!(rubric_id = %rubric_id, error = %e, "Failed to enqueue rubric job");
            db::rubrics::set_rubric_status(&self.db, &rubric_id, VivaStatus::Error).await?;
            return Err(e);
        }

        info!(rubric_id = %rubric_id, "Enqueued rubric generation job");
        Ok(())
    }
}
