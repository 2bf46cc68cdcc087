//! Client configuration file support.
//!
//! Configuration is layered. In increasing precedence:
//! 1. Defaults
//! 2. Global config file (~/.triply/config.toml)
//! 3. Local config file (./.triplyrc)
//! 4. Environment (`TRIPLY_API_URL`)
//! 5. Explicit overrides (CLI flags)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use triply_core::ProgressSettings;

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "TRIPLY_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_START_PATH: &str = "/api/trips/generate/stream";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 500;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    Read(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Progress smoothing overrides. Unset fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stall_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lead: Option<f64>,
}

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path of the start endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,

    /// Timeout for the start handshake. The event stream itself has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// How long to keep the stream open after a terminal envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_grace_ms: Option<u64>,

    #[serde(default)]
    pub progress: ProgressConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".triply")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".triplyrc")
    }

    /// Discover and load configuration files, then apply the environment.
    ///
    /// Unreadable or invalid files are skipped.
    pub fn discover_and_load() -> Self {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(file) => config.merge(&file),
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring configuration file"
                    );
                }
            }
        }

        config.apply_env_url(std::env::var(API_URL_ENV).ok());
        config
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref base_url) = other.base_url {
            self.base_url = Some(base_url.clone());
        }
        if let Some(ref start_path) = other.start_path {
            self.start_path = Some(start_path.clone());
        }
        if let Some(timeout) = other.request_timeout_secs {
            self.request_timeout_secs = Some(timeout);
        }
        if let Some(grace) = other.close_grace_ms {
            self.close_grace_ms = Some(grace);
        }
        let progress = &other.progress;
        if progress.tick_ms.is_some() {
            self.progress.tick_ms = progress.tick_ms;
        }
        if progress.stall_ms.is_some() {
            self.progress.stall_ms = progress.stall_ms;
        }
        if progress.increment.is_some() {
            self.progress.increment = progress.increment;
        }
        if progress.max_lead.is_some() {
            self.progress.max_lead = progress.max_lead;
        }
    }

    /// Applies the `TRIPLY_API_URL` value, if any.
    pub fn apply_env_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = Some(url);
        }
    }

    /// Checks values that would otherwise fail later and less clearly.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(ref url) = self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                let message = format!("base_url must be an http(s) URL: {url}");
                return Err(ConfigError::InvalidValue(message));
            }
        }
        if let Some(increment) = self.progress.increment {
            if !(0.0..=1.0).contains(&increment) {
                let message = format!("progress.increment out of range: {increment}");
                return Err(ConfigError::InvalidValue(message));
            }
        }
        if let Some(lead) = self.progress.max_lead {
            if !(0.0..=1.0).contains(&lead) {
                let message = format!("progress.max_lead out of range: {lead}");
                return Err(ConfigError::InvalidValue(message));
            }
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/')
    }

    pub fn start_path(&self) -> &str {
        self.start_path.as_deref().unwrap_or(DEFAULT_START_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms.unwrap_or(DEFAULT_CLOSE_GRACE_MS))
    }

    pub fn progress_settings(&self) -> ProgressSettings {
        let defaults = ProgressSettings::default();
        ProgressSettings {
            tick_ms: self.progress.tick_ms.unwrap_or(defaults.tick_ms),
            stall_ms: self.progress.stall_ms.unwrap_or(defaults.stall_ms),
            increment: self.progress.increment.unwrap_or(defaults.increment),
            max_lead: self.progress.max_lead.unwrap_or(defaults.max_lead),
        }
    }
}
