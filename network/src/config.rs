// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::connection::ReconnectPolicy;
use crate::sequence::DEFAULT_DEDUP_WINDOW;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pause before an AI move, in milliseconds
    #[serde(default = "default_ai_delay_ms")]
    pub ai_delay_ms: u64,
    /// Most out-of-order peer messages held at once
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    /// Push channel endpoint
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_ai_delay_ms() -> u64 {
    1000
}

fn default_dedup_window() -> usize {
    DEFAULT_DEDUP_WINDOW
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_server_url() -> String {
    "https://websocket-server-hackathon-europe.onrender.com".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ai_delay_ms: default_ai_delay_ms(),
            dedup_window: default_dedup_window(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_attempts: default_reconnect_attempts(),
            server_url: default_server_url(),
        }
    }
}

impl SessionConfig {
    pub fn ai_delay(&self) -> Duration {
        Duration::from_millis(self.ai_delay_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(self.reconnect_delay_ms),
            max_attempts: self.reconnect_attempts,
        }
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("io", "duelboard", "duelboard")
        .context("Failed to determine config directory")?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

pub fn load_config() -> Result<SessionConfig> {
    let config_path = get_config_path().context("Failed to determine config path")?;
    load_config_from(&config_path)
}

/// Load the config at `config_path`, writing the defaults there if it does not exist
pub fn load_config_from(config_path: &Path) -> Result<SessionConfig> {
    if !config_path.exists() {
        tracing::info!("Config file not found, creating default at: {}", config_path.display());

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let default_config = SessionConfig::default();
        save_config_to(&default_config, config_path)?;
        return Ok(default_config);
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    toml::from_str::<SessionConfig>(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

pub fn save_config(config: &SessionConfig) -> Result<()> {
    let config_path = get_config_path().context("Failed to determine config path")?;
    save_config_to(config, &config_path)
}

pub fn save_config_to(config: &SessionConfig, config_path: &Path) -> Result<()> {
    let toml_content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(config_path, toml_content)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    tracing::info!("Saved config to: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.ai_delay(), Duration::from_secs(1));
        assert_eq!(config.dedup_window, 8192);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn test_missing_file_is_created() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = load_config_from(&config_path)?;
        assert_eq!(config, SessionConfig::default());
        assert!(config_path.exists());
        Ok(())
    }

    #[test]
    fn test_load_save_config() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut config = SessionConfig::default();
        config.ai_delay_ms = 250;
        config.reconnect_attempts = 2;
        save_config_to(&config, &config_path)?;

        assert_eq!(load_config_from(&config_path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "ai_delay_ms = 10\n")?;

        let config = load_config_from(&config_path)?;
        assert_eq!(config.ai_delay_ms, 10);
        assert_eq!(config.reconnect_delay_ms, 3000);
        Ok(())
    }
}
