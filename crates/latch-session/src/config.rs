//! # Configuration Persistence
//!
//! Endpoint and routing settings, saved to and loaded from disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while persisting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The platform has no user configuration directory.
    #[error("could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the config file failed.
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The config could not be serialized.
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Paths of the backend authentication endpoints, relative to `api_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Login endpoint.
    pub login: String,
    /// Registration endpoint.
    pub register: String,
    /// Logout notification endpoint.
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            register: "/api/auth/register".to_string(),
            logout: "/api/auth/logout".to_string(),
        }
    }
}

/// Session manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the authentication backend.
    pub api_url: String,

    /// Endpoint paths under `api_url`.
    pub endpoints: Endpoints,

    /// Absolute URL of the third-party address lookup service.
    ///
    /// Must answer `GET` with `{"ip": "..."}`.
    pub identity_lookup_url: String,

    /// Route navigated to after logout.
    pub entry_route: String,

    /// Timeout applied to every HTTP request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            endpoints: Endpoints::default(),
            identity_lookup_url: "https://api.ipify.org?format=json".to_string(),
            entry_route: "/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Returns the default config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("latch").join("config.json"))
    }

    /// Loads configuration from the default path, or returns defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            tracing::warn!("Could not determine config directory");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Loads configuration from `path`, or returns defaults if it is
    /// missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(?path, "Loaded configuration");
                    config
                }
                Err(e) => {
                    tracing::warn!(?path, error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(?path, error = %e, "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Saves configuration to the default path and returns that path.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::NoConfigDir`] - No user config directory exists
    /// * [`ConfigError::Io`] - The directory or file cannot be written
    /// * [`ConfigError::Serialization`] - The config cannot be encoded
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Saves configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] - The directory or file cannot be written
    /// * [`ConfigError::Serialization`] - The config cannot be encoded
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        tracing::info!(?path, "Saved configuration");
        Ok(())
    }

    /// Joins an endpoint path onto `api_url`.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}
