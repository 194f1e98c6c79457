//! Updater configuration.
//!
//! Everything the unattended update cycle needs lives in one TOML file:
//!
//! ```toml
//! app_name = "myapp"
//! current_version = "1.4.2"
//! manifest_url = "https://updates.example.com/meta"
//! binary_url = "https://updates.example.com/bin"
//! channel = "beta"
//! state_dir = "update"
//!
//! [schedule]
//! policy = "interval"
//! base_hours = 24
//! jitter_hours = 6
//! ```
//!
//! The file is looked up at `~/.rollout/config.toml` unless the
//! `ROLLOUT_CONFIG_PATH` environment variable points elsewhere. Embedders
//! that drive [`Updater`](crate::updater::Updater) directly can skip this
//! module entirely.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::manifest::Channel;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ROLLOUT_CONFIG_PATH";

/// Configuration consumed by the updater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Application name as published in the release layout.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Version of the running binary. The default, `dev`, never
    /// self-updates - a deployment must state its version to opt in.
    #[serde(default = "default_current_version")]
    pub current_version: String,
    /// Base URL for update manifests.
    pub manifest_url: String,
    /// Base URL for binary payloads.
    pub binary_url: String,
    /// Release channel to follow.
    #[serde(default)]
    pub channel: Channel,
    /// Directory holding updater state; a relative path resolves against the
    /// executable's own directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Check on every cycle regardless of the persisted schedule.
    #[serde(default)]
    pub force_check: bool,
    /// When checks run.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Scheduling policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ScheduleConfig {
    /// Check once per day at a fixed local hour (0-23).
    Daily { hour: u32 },
    /// Check every `base_hours`, spread by up to `jitter_hours` of random
    /// delay so a fleet does not stampede the update source.
    Interval {
        base_hours: u64,
        #[serde(default)]
        jitter_hours: u64,
    },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::Interval {
            base_hours: 24,
            jitter_hours: 6,
        }
    }
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_current_version() -> String {
    "dev".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("update")
}

impl UpdateConfig {
    /// Resolve the config file location: `ROLLOUT_CONFIG_PATH` when set,
    /// `~/.rollout/config.toml` otherwise.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".rollout").join("config.toml"))
    }

    /// Load from the default location.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?).await
    }

    /// Load from an explicit path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Write to an explicit path, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, raw)
            .await
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}
