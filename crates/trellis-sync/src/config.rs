//! Agent configuration.
//!
//! Loaded from a JSON file at startup; a missing file yields the defaults,
//! so a freshly flashed device comes up with a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("invalid config: {0}")]
    Parse(String),
}

/// Broker connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "trellis-agent".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 5,
        }
    }
}

/// Roots of the broker topic namespace. Topics must not start with `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub devices_root: String,
    pub sensors_root: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            devices_root: "devices".to_string(),
            sensors_root: "sensors".to_string(),
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    /// Path of the persisted settings store.
    pub store_path: Option<PathBuf>,
}

impl AgentConfig {
    /// Default location of the persisted settings store.
    pub fn default_store_path() -> PathBuf {
        PathBuf::from(".settings/devices.json")
    }

    /// The configured store path, or the default.
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(Self::default_store_path)
    }

    /// Load the configuration from a JSON file. A missing file yields the
    /// defaults; a file that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics.devices_root, "devices");
        assert_eq!(config.topics.sensors_root, "sensors");
        assert_eq!(config.store_path(), AgentConfig::default_store_path());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.broker.host, "localhost");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        fs::write(
            &path,
            r#"{"broker": {"host": "broker.local"}, "topics": {"devices_root": "greenhouse/devices"}}"#,
        )
        .unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics.devices_root, "greenhouse/devices");
        assert_eq!(config.topics.sensors_root, "sensors");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(AgentConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
