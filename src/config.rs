use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub sender_groups: SenderGroupsConfig,
}

/// Transport behaviour of the Gmail client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderGroupsConfig {
    /// Messages sampled per label when inferring sender domains
    #[serde(default = "default_max_messages_per_label")]
    pub max_messages_per_label: u32,
}

impl Default for SenderGroupsConfig {
    fn default() -> Self {
        Self {
            max_messages_per_label: default_max_messages_per_label(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_messages_per_label() -> u32 {
    25
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SyncError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| SyncError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.client.max_retries > 10 {
            return Err(SyncError::ConfigError(
                "client.max_retries cannot exceed 10".to_string(),
            ));
        }

        if self.client.request_timeout_secs == 0 {
            return Err(SyncError::ConfigError(
                "client.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.client.request_timeout_secs > 300 {
            return Err(SyncError::ConfigError(
                "client.request_timeout_secs cannot exceed 300".to_string(),
            ));
        }

        if self.sender_groups.max_messages_per_label == 0 {
            return Err(SyncError::ConfigError(
                "sender_groups.max_messages_per_label must be at least 1".to_string(),
            ));
        }
        // Gmail caps a single listing page at 500
        if self.sender_groups.max_messages_per_label > 500 {
            return Err(SyncError::ConfigError(
                "sender_groups.max_messages_per_label cannot exceed 500".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
