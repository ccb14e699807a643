//! Application settings management

use crate::{PathManager, crypto};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Application settings stored in settings.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model name sent with every request
    pub model: String,
    /// Chat-completions base URL including the version path
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub connect_timeout_secs: Option<u64>,
    /// Idle time allowed between body reads; unset means no bound
    pub read_timeout_secs: Option<u64>,
    /// Encrypted API key
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: None,
            api_key: None,
        }
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        match PathManager::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or unparsable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Self {
        toml::from_str(content).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "settings file is invalid, using defaults");
            Self::default()
        })
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize settings: {}", e))
    }

    /// Decrypted API key. `None` if not set or decryption fails.
    pub fn get_api_key(&self) -> Option<String> {
        let encrypted = self.api_key.as_ref()?;
        match crypto::decrypt_string(encrypted) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "stored API key could not be decrypted");
                None
            }
        }
    }

    /// Encrypts before storing.
    pub fn set_api_key(&mut self, api_key: &str) -> Result<(), String> {
        self.api_key = Some(crypto::encrypt_string(api_key)?);
        Ok(())
    }

    pub fn remove_api_key(&mut self) {
        self.api_key = None;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
