//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the API
//! base URL, where session state lives, the last used email, and idle-session
//! monitor settings.
//!
//! Configuration is stored at `~/.config/catering-console/config.json`.
//! `CATERING_API_URL` and `CATERING_STATE_DIR` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::MonitorConfig;
use crate::utils::{read_json, write_json_atomic};

/// Application name used for config/state directory paths
const APP_NAME: &str = "catering-console";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

pub const API_URL_ENV: &str = "CATERING_API_URL";
pub const STATE_DIR_ENV: &str = "CATERING_STATE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub last_email: Option<String>,
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            last_email: None,
            state_dir: None,
            monitor: MonitorSettings::default(),
        }
    }
}

/// Idle-session settings as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub timeout_minutes: u64,
    pub warning_minutes: u64,
    pub auto_logout: bool,
    pub debounce_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: 60,
            warning_minutes: 5,
            auto_logout: true,
            debounce_secs: 5,
        }
    }
}

impl MonitorSettings {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::from_minutes(self.timeout_minutes, self.warning_minutes);
        config.auto_logout = self.auto_logout;
        config.debounce = Duration::from_secs(self.debounce_secs);
        config
    }
}

impl Config {
    /// Load the config file (defaults if absent) and apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(STATE_DIR_ENV).ok().map(PathBuf::from),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Record the last email used to sign in. Only the file is rewritten,
    /// so env overrides in effect for this run are not persisted.
    pub fn remember_email(email: &str) -> Result<()> {
        Self::remember_email_at(&Self::config_path()?, email)
    }

    pub fn remember_email_at(path: &Path, email: &str) -> Result<()> {
        let mut stored = Self::load_from(path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(path)
    }

    pub fn apply_overrides(&mut self, api_url: Option<String>, state_dir: Option<PathBuf>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(dir) = state_dir {
            self.state_dir = Some(dir);
        }
    }

    /// The API base URL, checked to be an absolute http(s) URL.
    pub fn api_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("API URL must use http or https: {}", self.api_url);
        }
        Ok(url)
    }

    /// Where the session file and signal marker live.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.state_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
