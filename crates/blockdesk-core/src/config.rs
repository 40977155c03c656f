//! Application configuration management.
//!
//! Configuration is stored at `<config_dir>/blockdesk/config.json`. The
//! backend URL can be overridden per run with `BLOCKDESK_API_URL`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "blockdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub const API_URL_ENV: &str = "BLOCKDESK_API_URL";
pub const USERNAME_ENV: &str = "BLOCKDESK_USERNAME";
pub const PASSWORD_ENV: &str = "BLOCKDESK_PASSWORD";
pub const API_KEY_ENV: &str = "BLOCKDESK_API_KEY";

const DEFAULT_API_LOG_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub last_username: Option<String>,
    #[serde(default = "default_api_log_refresh_secs")]
    pub api_log_refresh_secs: u64,
}

fn default_api_log_refresh_secs() -> u64 {
    DEFAULT_API_LOG_REFRESH_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            last_username: None,
            api_log_refresh_secs: DEFAULT_API_LOG_REFRESH_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the session file and the log.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend base URL: environment, then config file, then the default.
    pub fn api_url(&self) -> String {
        self.resolve_api_url(std::env::var(API_URL_ENV).ok())
    }

    fn resolve_api_url(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string()
    }
}
