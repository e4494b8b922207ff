use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::FOOTBALL_DATA_API_BASE;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable holding the football-data.org API key.
pub const API_KEY_ENV: &str = "FOOTBALL_DATA_API_KEY";

/// Environment variable holding the broadcast webhook URL.
pub const WEBHOOK_URL_ENV: &str = "BROADCAST_WEBHOOK_URL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Seconds between poll cycles for each watched form.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds to wait for poll loops to exit on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    5
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Live data provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Overridden by `FOOTBALL_DATA_API_KEY` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    FOOTBALL_DATA_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl DataSourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where update events go. Stdout JSON lines are always on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Overridden by `BROADCAST_WEBHOOK_URL` when set.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply secrets from the environment (after `dotenvy` has loaded `.env`).
    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.data_source.api_key = Some(key);
        }
        if let Some(url) = non_empty_env(WEBHOOK_URL_ENV) {
            self.broadcast.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.poll_interval_secs == 0 {
            anyhow::bail!("settings.poll_interval_secs must be positive");
        }
        if self.data_source.timeout_secs == 0 {
            anyhow::bail!("data_source.timeout_secs must be positive");
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
