//! Workbench configuration
//!
//! Loaded from an optional TOML file, then overridden by `DC_`-prefixed
//! environment variables. Every section and key is optional.
//!
//! ```toml
//! [api]
//! base_url = "http://127.0.0.1:18500"
//! request_timeout_ms = 30000
//!
//! [tasks]
//! poll_interval_ms = 2000
//!
//! [autosave]
//! debounce_ms = 2000
//!
//! [health]
//! interval_ms = 5000
//!
//! [storage]
//! local_dir = "/home/me/.local/share/DreamCanvas/local"
//! host_projects_dir = "/home/me/DreamCanvas/projects"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Remote task queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Task queue base URL
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: dc_client::DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Task poller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TasksConfig {
    /// Delay between polling cycles
    pub poll_interval_ms: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
        }
    }
}

/// Autosave settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutosaveConfig {
    /// Quiet window before a save
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 2_000 }
    }
}

/// Health probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Delay between probes
    pub interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

/// Where projects are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory backing local storage
    pub local_dir: PathBuf,
    /// Native host projects root; its presence selects the host bridge
    pub host_projects_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("DreamCanvas")
                .join("local"),
            host_projects_dir: None,
        }
    }
}

/// Complete workbench configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DreamCanvasConfig {
    /// Task queue
    pub api: ApiConfig,
    /// Poller
    pub tasks: TasksConfig,
    /// Autosave
    pub autosave: AutosaveConfig,
    /// Health probe
    pub health: HealthConfig,
    /// Storage
    pub storage: StorageConfig,
}

impl DreamCanvasConfig {
    /// Load from `path` (if any), then apply process environment overrides
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content
    ///
    /// # Errors
    /// Returns error on malformed TOML or unknown keys
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DC_*` overrides from `lookup`
    ///
    /// # Errors
    /// Returns error if a numeric override does not parse
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DC_API_BASE_URL") {
            self.api.base_url = value;
        }
        override_number(&lookup, "DC_API_REQUEST_TIMEOUT_MS", &mut self.api.request_timeout_ms)?;
        override_number(&lookup, "DC_POLL_INTERVAL_MS", &mut self.tasks.poll_interval_ms)?;
        override_number(&lookup, "DC_AUTOSAVE_DEBOUNCE_MS", &mut self.autosave.debounce_ms)?;
        override_number(&lookup, "DC_HEALTH_INTERVAL_MS", &mut self.health.interval_ms)?;
        if let Some(value) = lookup("DC_LOCAL_STORAGE_DIR") {
            self.storage.local_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("DC_HOST_PROJECTS_DIR") {
            self.storage.host_projects_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        Ok(())
    }

    /// Reject unusable values
    ///
    /// # Errors
    /// Returns error for empty base URL or zero durations
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url", &self.api.base_url));
        }
        for (key, value) in [
            ("api.request_timeout_ms", self.api.request_timeout_ms),
            ("tasks.poll_interval_ms", self.tasks.poll_interval_ms),
            ("autosave.debounce_ms", self.autosave.debounce_ms),
            ("health.interval_ms", self.health.interval_ms),
        ] {
            if value == 0 {
                return Err(invalid(key, &value.to_string()));
            }
        }
        Ok(())
    }

    /// Per-request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    /// Poller interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tasks.poll_interval_ms)
    }

    /// Autosave quiet window
    #[inline]
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ms)
    }

    /// Health probe interval
    #[inline]
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health.interval_ms)
    }
}

fn override_number<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| invalid(key, &raw))?;
    }
    Ok(())
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
