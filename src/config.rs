//! Bridge configuration
//!
//! The library takes this struct by value; only the binary loads it from a
//! YAML file. Every field defaults, so a missing file means a usable
//! bridge.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// MIDI client name registered with the OS, visible to other
    /// applications.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Case-insensitive substring restricting which device names are
    /// bridged. Absent means every input device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,

    /// Hotplug poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the bridge event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_client_name() -> String {
    "keybridge".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_event_buffer() -> usize {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            name_filter: None,
            poll_interval_ms: default_poll_interval_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file with validation.
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: BridgeConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration consistency
    fn validate(&self) -> Result<()> {
        if self.client_name.is_empty() {
            anyhow::bail!("client_name must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.client_name, "keybridge");
        assert!(config.name_filter.is_none());
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.event_buffer, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: BridgeConfig = serde_yaml::from_str("name_filter: piano\n").unwrap();
        assert_eq!(config.name_filter.as_deref(), Some("piano"));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.client_name, "keybridge");
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let config = BridgeConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BridgeConfig {
            event_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
