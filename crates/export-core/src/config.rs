//! Configuration management for the export pipeline
//!
//! Destination credentials arrive already decrypted from the credential
//! store; this module only parses and validates the structure.

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub instantly: InstantlyConfig,
    pub smartlead: SmartleadConfig,

    #[serde(default = "default_export")]
    pub export: ExportLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstantlyConfig {
    #[serde(alias = "token")] // Accept both 'api_key' and 'token'
    pub api_key: String,

    #[serde(alias = "api_url", default = "default_instantly_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmartleadConfig {
    #[serde(alias = "token")]
    pub api_key: String,

    #[serde(alias = "api_url", default = "default_smartlead_base_url")]
    pub base_url: String,
}

/// Tunables for the lead upload stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportLimits {
    #[serde(default = "default_batch_size")]
    pub lead_batch_size: usize,

    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_instantly_base_url() -> String {
    "https://api.instantly.ai/api/v2".to_string()
}

fn default_smartlead_base_url() -> String {
    "https://server.smartlead.ai/api/v1".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_concurrency() -> usize {
    3
}

fn default_export() -> ExportLimits {
    ExportLimits {
        lead_batch_size: default_batch_size(),
        batch_concurrency: default_batch_concurrency(),
    }
}

impl ExportConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ExportError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ExportConfig = serde_json::from_str(json)
            .map_err(|e| ExportError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.instantly.api_key.is_empty() {
            return Err(ExportError::Config("Instantly API key is required".to_string()));
        }

        if self.smartlead.api_key.is_empty() {
            return Err(ExportError::Config("Smartlead API key is required".to_string()));
        }

        if self.export.lead_batch_size == 0 {
            return Err(ExportError::Config("lead_batch_size must be at least 1".to_string()));
        }

        if self.export.batch_concurrency == 0 {
            return Err(ExportError::Config("batch_concurrency must be at least 1".to_string()));
        }

        Ok(())
    }
}
