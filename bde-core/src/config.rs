use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

pub const APP_DIR_NAME: &str = "bde-mmi";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub retry_attempts: u8,
    pub retry_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_owned(),
            anon_key: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

impl FeedConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Linear backoff before retry number `attempt`, capped at 30 seconds.
    pub fn backoff_for(&self, attempt: u8) -> Duration {
        self.retry_backoff()
            .checked_mul(u32::from(attempt))
            .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
    }
}

impl AppConfig {
    /// Dossier de configuration de l'application (`~/.config/bde-mmi` sous Linux)
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR_NAME))
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Charge la configuration, ou retombe sur les valeurs par défaut
    pub fn load() -> Self {
        let loaded = Self::config_file_path().and_then(|path| Self::load_from(&path));
        let mut config = match loaded {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "unable to load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) =
                    Self::config_file_path().and_then(|path| default_config.save_to(&path))
                {
                    warn!(error = %save_err, "unable to save default configuration");
                }
                default_config
            }
        };
        config.apply_env();
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `BDE_BACKEND_URL` and `BDE_ANON_KEY` win over the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("BDE_BACKEND_URL").ok(),
            std::env::var("BDE_ANON_KEY").ok(),
        );
    }

    fn apply_overrides(&mut self, url: Option<String>, anon_key: Option<String>) {
        if let Some(url) = url.filter(|v| !v.is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = anon_key.filter(|v| !v.is_empty()) {
            self.backend.anon_key = key;
        }
    }
}
