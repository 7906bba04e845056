//! LLM API client
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. The model is
//! instructed to answer with a JSON document; anything that does not parse
//! into the expected shape is a [`GenerationError::MalformedOutput`], which
//! the consume loop treats like any other generation failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use viva_common::message::{GeneratedQuestion, RubricBody, RubricRequest};

use super::{GenerationError, Generator};
use crate::config::LlmSettings;

const QUESTIONS_SYSTEM_PROMPT: &str = "You are an examiner preparing a viva (oral exam). \
    Given a student's submission text, produce interview questions that probe the student's \
    understanding and authorship of the work. Respond with JSON only, in the form \
    {\"questions\": [{\"question\": \"...\"}]}.";

const RUBRIC_SYSTEM_PROMPT: &str = "You are an assessment designer. Given an assessment task, \
    marking criteria, keywords and learning objectives, produce a marking rubric. Respond with \
    JSON only, in the form {\"title\": \"...\", \"criteria\": [{\"name\": \"...\", \
    \"descriptors\": [{\"level\": \"...\", \"description\": \"...\"}]}]}.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// LLM API client
pub struct LlmClient {
    http_client: reqwest::Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    /// One chat-completions round trip, returning the assistant content
    async fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
        };

        tracing::debug!(model = %self.settings.model, url = %url, "Calling generation API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(Duration::from_secs(
                        self.settings.request_timeout_secs,
                    ))
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), error_text));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedOutput(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedOutput("completion has no choices".to_string()))
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate_questions(
        &self,
        submission: &str,
        custom_prompt: Option<&str>,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        let mut user = format!("Submission text:\n{}", submission);
        if let Some(extra) = custom_prompt {
            user.push_str("\n\nAdditional instructions: ");
            user.push_str(extra);
        }

        let content = self.chat(QUESTIONS_SYSTEM_PROMPT, &user).await?;
        parse_questions(&content)
    }

    async fn generate_rubric(
        &self,
        request: &RubricRequest,
    ) -> Result<RubricBody, GenerationError> {
        let user = format!(
            "Assessment task: {}\nTitle: {}\nCriteria: {}\nKeywords: {}\nLearning objectives: {}\nExisting guide: {}",
            request.assessment_task,
            request.title,
            request.criteria.join("; "),
            request.keywords.join("; "),
            request.learning_objectives.join("; "),
            request.existing_guide,
        );

        let content = self.chat(RUBRIC_SYSTEM_PROMPT, &user).await?;
        parse_rubric(&content)
    }
}

/// Parse assistant content into a question set
fn parse_questions(content: &str) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    #[derive(Deserialize)]
    struct QuestionList {
        questions: Vec<GeneratedQuestion>,
    }

    let list: QuestionList = serde_json::from_str(content)
        .map_err(|e| GenerationError::MalformedOutput(e.to_string()))?;

    if list.questions.is_empty() {
        return Err(GenerationError::MalformedOutput(
            "empty question list".to_string(),
        ));
    }

    Ok(list.questions)
}

/// Parse assistant content into a rubric body
fn parse_rubric(content: &str) -> Result<RubricBody, GenerationError> {
    serde_json::from_str(content).map_err(|e| GenerationError::MalformedOutput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_questions_accepts_expected_shape() {
        let content = r#"{"questions": [{"question": "Q1?"}, {"question": "Q2?"}]}"#;
        let questions = parse_questions(content).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "Q1?");
    }

    #[test]
    fn parse_questions_rejects_prose() {
        let err = parse_questions("Here are your questions: 1. ...").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn parse_questions_rejects_empty_list() {
        let err = parse_questions(r#"{"questions": []}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn parse_rubric_accepts_expected_shape() {
        let content = r#"{
            "title": "Essay rubric",
            "criteria": [
                {"name": "Evidence", "descriptors": [
                    {"level": "Pass", "description": "Some supporting evidence"}
                ]}
            ]
        }"#;
        let rubric = parse_rubric(content).unwrap();
        assert_eq!(rubric.title, "Essay rubric");
        assert_eq!(rubric.criteria.len(), 1);
    }

    #[test]
    fn client_creation_succeeds_with_defaults() {
        assert!(LlmClient::new(LlmSettings::default()).is_ok());
    }
}
