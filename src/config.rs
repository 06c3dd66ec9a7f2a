use std::path::PathBuf;

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 7;

/// Client configuration. Every field has a default so a partial YAML file
/// (or none at all) is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the remote compute service.
    pub base_url: String,
    /// Seconds between poll ticks.
    pub poll_interval_secs: u64,
    /// Directory holding the persisted task collections.
    pub store_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8020".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            store_root: PathBuf::from(".pocketq"),
        }
    }
}

impl Config {
    pub fn from_yaml_file(file_path: &str) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file from {}", file_path))?;

        let config: Config = serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("Failed to deserialize config from {}", file_path))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("base_url: https://compute.example.org").unwrap();
        assert_eq!(config.base_url, "https://compute.example.org");
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }
}
