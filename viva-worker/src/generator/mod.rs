//! Content generation seam
//!
//! The worker talks to exactly one external service: the language-model
//! API. Everything upstream of it is expressed through the [`Generator`]
//! trait so the consume loop can be tested without the network.

pub mod llm;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use viva_common::message::{GeneratedQuestion, RubricBody, RubricRequest};

pub use llm::LlmClient;

/// Generation call errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// External AI-generation collaborator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate viva questions from extracted submission text
    async fn generate_questions(
        &self,
        submission: &str,
        custom_prompt: Option<&str>,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError>;

    /// Generate a marking rubric from assessment criteria
    async fn generate_rubric(
        &self,
        request: &RubricRequest,
    ) -> Result<RubricBody, GenerationError>;
}
