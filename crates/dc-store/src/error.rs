//! Error types for the state store

use dc_bridge::BridgeError;
use dc_client::ClientError;
use std::path::PathBuf;

/// Failures returned by store operations that propagate to the caller
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Persistence bridge failed
    #[error("persistence failed: {0}")]
    Bridge(#[from] BridgeError),

    /// Task queue request failed
    #[error("task request failed: {0}")]
    Client(#[from] ClientError),
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an unusable value
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Offending value
        value: String,
    },
}
