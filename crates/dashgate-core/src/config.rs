//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API origin, credential backend, session TTL and the
//! last used email address.
//!
//! Configuration is stored at `~/.config/dashgate/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "dashgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API origin
pub const API_URL_ENV: &str = "DASHGATE_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Access credentials live for an hour.
const DEFAULT_CREDENTIAL_TTL_MINUTES: u64 = 60;

/// Delay before a redirect navigates, so the notice is seen first.
const DEFAULT_REDIRECT_DELAY_MS: u64 = 2000;

const DEFAULT_SIGN_IN_PATH: &str = "/auth/signin";

/// Redirect targets containing this marker are forced password changes.
const DEFAULT_POLICY_MARKER: &str = "forgot-password";

/// Runtime settings for `ApiClient`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub credential_ttl: Duration,
    pub redirect_delay: Duration,
    pub sign_in_path: String,
    pub policy_marker: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            credential_ttl: Duration::from_secs(DEFAULT_CREDENTIAL_TTL_MINUTES * 60),
            redirect_delay: Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            policy_marker: DEFAULT_POLICY_MARKER.to_string(),
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    pub credential_ttl_minutes: Option<u64>,
    pub redirect_delay_ms: Option<u64>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Client settings from this config, with `DASHGATE_API_URL` taking
    /// precedence over the stored origin.
    pub fn settings(&self) -> ClientSettings {
        let env_url = std::env::var(API_URL_ENV).ok().filter(|s| !s.is_empty());
        self.settings_with_origin(env_url)
    }

    fn settings_with_origin(&self, origin_override: Option<String>) -> ClientSettings {
        let mut settings = ClientSettings::default();
        if let Some(url) = origin_override.or_else(|| self.api_base_url.clone()) {
            settings.base_url = url;
        }
        if let Some(minutes) = self.credential_ttl_minutes {
            settings.credential_ttl = Duration::from_secs(minutes * 60);
        }
        if let Some(ms) = self.redirect_delay_ms {
            settings.redirect_delay = Duration::from_millis(ms);
        }
        settings
    }
}
