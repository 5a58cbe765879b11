//! Configuration module
//!
//! Handles loading and managing configuration.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::EngineConfig;

/// Default config file locations, probed in order
const CONFIG_LOCATIONS: [&str; 3] = ["./crucible.yaml", "./crucible.yml", "./crucible.json"];

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum concurrently running executions
    pub max_concurrent_executions: usize,

    /// Concurrent cases within a parallel run
    pub max_concurrent_cases: usize,

    /// Case timeout in seconds when a case sets none
    pub default_case_timeout_secs: u64,

    /// How long finished executions stay queryable, in seconds
    pub retention_secs: u64,

    /// Registry sweep interval in seconds
    pub cleanup_interval_secs: u64,

    /// Directory holding `suites/` and `vaults/` definition files
    pub definitions_dir: PathBuf,

    /// Results archive directory; platform data dir when unset
    pub results_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            max_concurrent_cases: 5,
            default_case_timeout_secs: 60,
            retention_secs: 3600,
            cleanup_interval_secs: 300,
            definitions_dir: PathBuf::from("./definitions"),
            results_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if path
            .as_ref()
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if path
            .as_ref()
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Load from the first standard location, defaults otherwise
    pub fn load_or_default() -> Result<Self> {
        for location in CONFIG_LOCATIONS {
            if Path::new(location).exists() {
                return Self::load(location);
            }
        }
        Ok(Self::default())
    }

    /// Engine tuning derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_executions: self.max_concurrent_executions,
            default_case_timeout_secs: self.default_case_timeout_secs,
            retention_secs: self.retention_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_concurrent_executions, 10);
        assert_eq!(config.max_concurrent_cases, 5);
        assert_eq!(config.default_case_timeout_secs, 60);
        assert_eq!(config.retention_secs, 3600);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crucible.yaml");

        let mut config = AppConfig::default();
        config.max_concurrent_executions = 3;
        config.definitions_dir = PathBuf::from("/srv/defs");
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.max_concurrent_executions, 3);
        assert_eq!(loaded.definitions_dir, PathBuf::from("/srv/defs"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crucible.yaml");
        std::fs::write(&path, "retention_secs: 60\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.retention_secs, 60);
        assert_eq!(loaded.max_concurrent_executions, 10);
    }

    #[test]
    fn test_engine_config_mapping() {
        let config = AppConfig {
            max_concurrent_executions: 2,
            default_case_timeout_secs: 7,
            retention_secs: 11,
            ..AppConfig::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.max_concurrent_executions, 2);
        assert_eq!(engine.default_case_timeout_secs, 7);
        assert_eq!(engine.retention_secs, 11);
    }
}
