//! User settings and preferences
//!
//! Manages application settings stored in ~/.pgedit/config.toml

use crate::config::ConnectionProfile;
use crate::error::ConfigResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Driver-level connect timeout; `None` waits indefinitely
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Reported to the server as `application_name`
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// How NULL cells are shown by the CLI
    #[serde(default = "default_null_display")]
    pub null_display: String,
}

fn default_application_name() -> String {
    "pgedit".to_string()
}

fn default_null_display() -> String {
    "NULL".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: None,
            application_name: default_application_name(),
            null_display: default_null_display(),
        }
    }
}

impl Settings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Load settings from config file
pub fn load_settings() -> ConfigResult<Settings> {
    let path = ConnectionProfile::config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
