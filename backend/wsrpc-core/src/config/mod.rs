//! Session configuration stored as `{config_dir}/wsrpc.toml`.

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "wsrpc.toml";
const CONFIG_VERSION: u32 = 1;

/// Environment variable that overrides the configured URL.
pub const URL_ENV_VAR: &str = "WSRPC_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_url")]
    pub url: String,

    /// Log every inbound frame at info level.
    #[serde(default)]
    pub log_frames: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            url: default_url(),
            log_frames: false,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

/// Parses a WebSocket address, accepting only `ws` and `wss` URLs.
pub fn parse_ws_url(text: &str) -> Result<Url, String> {
    if text.is_empty() {
        return Err("url cannot be empty".to_string());
    }

    let url = Url::parse(text).map_err(|e| format!("Invalid URL {text}: {e}"))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(format!(
            "Invalid URL scheme {scheme} in {text} (expected ws or wss)"
        )),
    }
}

impl SessionConfig {
    /// Load config from {config_dir}/wsrpc.toml.
    ///
    /// # Returns
    ///
    /// Returns `Ok(SessionConfig)` if loaded successfully or defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: SessionConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/wsrpc.toml using temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// the write or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
                location: ErrorLocation::from(Location::caller()),
                reason: e.to_string(),
            })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        parse_ws_url(&self.url).map_err(|reason| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason,
        })?;

        Ok(())
    }

    /// Replaces the URL with `WSRPC_URL` when that variable is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        match std::env::var(URL_ENV_VAR) {
            Ok(url) if !url.is_empty() => {
                info!("Using {URL_ENV_VAR} override: {url}");
                self.url = url;
            }
            _ => {}
        }
        self
    }
}
