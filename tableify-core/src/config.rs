//! TOML configuration: provider tuning, metric fallback key, export path.
//!
//! Every field has a default, so a missing file or section means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{MetricCatalog, DEFAULT_NET_INCOME_FALLBACK};
use crate::export::DEFAULT_SPREADSHEET_PATH;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableifyConfig {
    pub provider: ProviderConfig,
    pub metrics: MetricsConfig,
    pub export: ExportConfig,
}

/// HTTP provider tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Snapshot key used when `netIncome` is missing.
    pub net_income_fallback: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            net_income_fallback: DEFAULT_NET_INCOME_FALLBACK.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub spreadsheet_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            spreadsheet_path: PathBuf::from(DEFAULT_SPREADSHEET_PATH),
        }
    }
}

impl TableifyConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider.timeout_secs must be > 0".into()));
        }
        if self.metrics.net_income_fallback.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metrics.net_income_fallback must not be empty".into(),
            ));
        }
        if self.export.spreadsheet_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "export.spreadsheet_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The standard catalog with this config's fallback key.
    pub fn catalog(&self) -> MetricCatalog {
        MetricCatalog::with_net_income_fallback(self.metrics.net_income_fallback.trim())
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
