//! Startup selection of the persistence backend
//!
//! The capability check happens exactly once; business logic only ever sees
//! the resulting `Arc<dyn ProjectBridge>`.

use crate::bridge::ProjectBridge;
use crate::error::BridgeError;
use crate::fs_host::FsProjectHost;
use crate::host::{HostBridge, HostChannel};
use crate::local::LocalStorageBridge;
use crate::storage::KeyValueStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Whether a native host is available in this process
#[derive(Clone, Default)]
pub struct HostEnvironment {
    channel: Option<Arc<dyn HostChannel>>,
}

impl HostEnvironment {
    /// No native host
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Host reachable over `channel`
    #[inline]
    #[must_use]
    pub fn with_channel(channel: Arc<dyn HostChannel>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// Filesystem host when a projects directory is configured
    ///
    /// # Errors
    /// Returns error if the configured directory cannot be created
    pub fn from_projects_dir(dir: Option<PathBuf>) -> Result<Self, BridgeError> {
        match dir {
            Some(dir) => Ok(Self::with_channel(Arc::new(FsProjectHost::new(dir)?))),
            None => Ok(Self::none()),
        }
    }

    /// Whether a native host is present
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.channel.is_some()
    }

    /// The host channel, for operations only a native host supports
    ///
    /// # Errors
    /// - `BridgeError::Unreachable` if no host is present
    pub fn require_channel(&self) -> Result<Arc<dyn HostChannel>, BridgeError> {
        self.channel
            .clone()
            .ok_or_else(|| BridgeError::Unreachable("no native host in this environment".into()))
    }
}

impl std::fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("present", &self.is_present())
            .finish()
    }
}

/// Resolve the bridge for this session
///
/// Host-backed when a native host is present, local storage otherwise.
#[must_use]
pub fn select_bridge(
    env: &HostEnvironment,
    storage: Arc<dyn KeyValueStore>,
) -> Arc<dyn ProjectBridge> {
    let bridge: Arc<dyn ProjectBridge> = match &env.channel {
        Some(channel) => Arc::new(HostBridge::new(channel.clone())),
        None => Arc::new(LocalStorageBridge::new(storage)),
    };
    tracing::info!("Project persistence: {}", bridge.kind());
    bridge
}
