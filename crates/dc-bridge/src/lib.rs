//! DreamCanvas persistence bridge
//!
//! Decouples the project store from where projects live:
//! - [`LocalStorageBridge`]: the whole project list as one JSON array under a
//!   single key of a [`KeyValueStore`]
//! - [`HostBridge`]: each operation delegated to a native host over an
//!   opaque [`HostChannel`]
//! - [`FsProjectHost`]: the native host side, one directory per project
//!
//! The variant is chosen once at startup by [`select_bridge`] and never
//! re-evaluated.

#![warn(unreachable_pub)]

pub mod bridge;
pub mod error;
pub mod fs_host;
pub mod host;
pub mod local;
pub mod select;
pub mod storage;

pub use bridge::{BridgeKind, ProjectBridge};
pub use error::BridgeError;
pub use fs_host::FsProjectHost;
pub use host::{HostBridge, HostChannel, HostCommand, HostError};
pub use local::{LocalStorageBridge, STORAGE_KEY};
pub use select::{select_bridge, HostEnvironment};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
