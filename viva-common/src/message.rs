//! Message envelope types and wire codec
//!
//! Jobs and results travel between the backend and the AI worker as UTF-8
//! JSON over the broker's binary message body. Both directions share the
//! same envelope shape: a `type` discriminant, a correlation `uuid`, and a
//! `data` payload whose shape depends on `type`.
//!
//! The correlation `uuid` reuses the owning submission/rubric id, so a
//! result can always be matched back to its database row and redelivery is
//! idempotent at the dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decode failure for an incoming message body.
///
/// Always a typed error so consume loops can dead-letter or drop
/// deterministically instead of crashing.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not valid JSON, has an unknown `type`, or is missing a
    /// required field
    #[error("invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope carried an empty correlation uuid
    #[error("message uuid is empty")]
    EmptyUuid,
}

/// Job message published by the backend for the AI worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Correlation id; equals the owning submission/rubric id
    pub uuid: String,
    /// Reserved for future subtype routing; not currently interpreted
    #[serde(rename = "requestType", default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(flatten)]
    pub payload: JobPayload,
}

/// Job payload variants, discriminated by the wire `type` field.
///
/// Unknown extra fields inside `data` are tolerated on decode; missing
/// required fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobPayload {
    /// Generate viva questions from extracted submission text
    #[serde(rename = "vivaQuestions")]
    VivaQuestions(VivaQuestionsJob),
    /// Generate a marking rubric from assessment criteria
    #[serde(rename = "createRubric")]
    CreateRubric(RubricRequest),
}

/// Payload for a question-generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VivaQuestionsJob {
    /// Extracted document text of the submission
    pub submission: String,
    /// Optional user-supplied prompt addition
    #[serde(rename = "customPrompt", default)]
    pub custom_prompt: Option<String>,
}

/// Payload for a rubric-generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricRequest {
    pub id: String,
    pub title: String,
    #[serde(rename = "createdById")]
    pub created_by_id: String,
    #[serde(rename = "assignmentId")]
    pub assignment_id: String,
    #[serde(rename = "assessmentTask")]
    pub assessment_task: String,
    pub criteria: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(rename = "learningObjectives")]
    pub learning_objectives: Vec<String>,
    #[serde(rename = "existingGuide")]
    pub existing_guide: String,
}

/// Result message published by the AI worker back to the backend.
///
/// Same envelope shape as [`JobMessage`]; `data` carries the generated
/// content and `uuid` matches the originating job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// Correlation id copied from the originating job
    pub uuid: String,
    #[serde(flatten)]
    pub payload: ResultPayload,
}

/// Result payload variants, discriminated by the wire `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ResultPayload {
    #[serde(rename = "vivaQuestions")]
    VivaQuestions(Vec<GeneratedQuestion>),
    #[serde(rename = "createRubric")]
    CreateRubric(RubricBody),
}

/// A single generated viva question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
}

/// Generated rubric structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricBody {
    pub title: String,
    pub criteria: Vec<RubricCriterion>,
}

/// One rubric criterion with its per-level descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub descriptors: Vec<LevelDescriptor>,
}

/// Achievement-level descriptor within a rubric criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    pub level: String,
    pub description: String,
}

impl JobMessage {
    /// Encode to the UTF-8 JSON wire format
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode and validate an incoming job body
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let msg: JobMessage = serde_json::from_slice(bytes)?;
        if msg.uuid.trim().is_empty() {
            return Err(DecodeError::EmptyUuid);
        }
        Ok(msg)
    }
}

impl ResultMessage {
    /// Encode to the UTF-8 JSON wire format
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode and validate an incoming result body
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let msg: ResultMessage = serde_json::from_slice(bytes)?;
        if msg.uuid.trim().is_empty() {
            return Err(DecodeError::EmptyUuid);
        }
        Ok(msg)
    }
}
