//! Configuration for viva-worker
//!
//! Resolution priority: environment variables over the optional TOML file
//! named by `VIVA_CONFIG`, over compiled defaults.

use serde::Deserialize;
use std::time::Duration;
use viva_common::config::{env_parse, env_string};
use viva_common::queue::BrokerConfig;
use viva_common::Result;

use crate::consumer::RetryPolicy;

/// LLM API client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible chat-completions API
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// viva-worker configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// HTTP bind address for the health surface
    pub bind_addr: String,
    /// Broker connection and queue topology
    pub broker: BrokerConfig,
    /// LLM API client settings
    pub llm: LlmSettings,
    /// Total processing attempts per job before dead-lettering
    pub max_attempts: u32,
    /// Base delay between retry attempts (grows linearly per attempt)
    pub retry_delay_secs: u64,
    /// Bound on a single generation call
    pub generation_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5741".to_string(),
            broker: BrokerConfig::default(),
            llm: LlmSettings::default(),
            max_attempts: 3,
            retry_delay_secs: 5,
            generation_timeout_secs: 60,
        }
    }
}

impl WorkerConfig {
    /// Load from `VIVA_CONFIG` (when set) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config: WorkerConfig = viva_common::config::load_or_default()?;

        if let Some(addr) = env_string("VIVA_WORKER_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = env_string("VIVA_LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(key) = env_string("VIVA_LLM_API_KEY") {
            config.llm.api_key = key;
        }
        if let Some(model) = env_string("VIVA_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(n) = env_parse("VIVA_MAX_ATTEMPTS") {
            config.max_attempts = n;
        }
        if let Some(n) = env_parse("VIVA_RETRY_DELAY_SECS") {
            config.retry_delay_secs = n;
        }
        if let Some(n) = env_parse("VIVA_GENERATION_TIMEOUT_SECS") {
            config.generation_timeout_secs = n;
        }
        config.broker.apply_env_overrides();

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
