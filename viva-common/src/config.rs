//! Configuration loading helpers
//!
//! Services resolve configuration with environment variables taking priority
//! over an optional TOML file, falling back to compiled defaults. The TOML
//! file path comes from the `VIVA_CONFIG` environment variable.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "VIVA_CONFIG";

/// Path of the TOML config file, if one was named in the environment
pub fn config_path_from_env() -> Option<PathBuf> {
    env_string(CONFIG_PATH_ENV).map(PathBuf::from)
}

/// Parse a TOML config file into `T`.
///
/// A missing file is a configuration error when explicitly named; callers
/// that treat the file as optional should check existence first.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config file {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config file {} failed: {}", path.display(), e)))
}

/// Load config from the `VIVA_CONFIG` file when set, defaults otherwise
pub fn load_or_default<T: DeserializeOwned + Default>() -> Result<T> {
    match config_path_from_env() {
        Some(path) => load_toml(&path),
        None => Ok(T::default()),
    }
}

/// Non-empty environment variable value
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parsed environment variable value; unparseable values are ignored
pub fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct TestConfig {
        name: String,
        count: u32,
    }

    #[test]
    fn load_toml_parses_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"viva\"\ncount = 3").unwrap();

        let config: TestConfig = load_toml(file.path()).unwrap();
        assert_eq!(config.name, "viva");
        assert_eq!(config.count, 3);
    }

    #[test]
    fn load_toml_missing_file_is_config_error() {
        let result: Result<TestConfig> = load_toml(Path::new("/nonexistent/viva.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_toml_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"viva\"").unwrap();

        let config: TestConfig = load_toml(file.path()).unwrap();
        assert_eq!(config.name, "viva");
        assert_eq!(config.count, 0);
    }
}
