//! Configuration for viva-server
//!
//! Resolution priority: environment variables over the optional TOML file
//! named by `VIVA_CONFIG`, over compiled defaults.

use serde::Deserialize;
use std::path::PathBuf;
use viva_common::config::env_string;
use viva_common::queue::BrokerConfig;
use viva_common::Result;

/// viva-server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address for the thin trigger/health surface
    pub bind_addr: String,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Broker connection and queue topology
    pub broker: BrokerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
            db_path: PathBuf::from("viva.db"),
            broker: BrokerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `VIVA_CONFIG` (when set) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config: ServerConfig = viva_common::config::load_or_default()?;

        if let Some(addr) = env_string("VIVA_SERVER_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = env_string("VIVA_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        config.broker.apply_env_overrides();

        Ok(config)
    }
}
