//! DreamCanvas project state core
//!
//! Owns the single source of truth for the open project, the project list and
//! the in-flight generation tasks, and reconciles them with persistence and
//! the remote task queue:
//! - [`ProjectStore`]: explicit context object; every mutation goes through it
//! - [`TaskPoller`]: refreshes non-terminal tasks on an interval
//! - [`Autosave`]: persists after the canvas has been quiet for a debounce window
//! - [`DreamCanvasConfig`]: TOML + environment configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use dc_bridge::{select_bridge, HostEnvironment, MemoryStorage};
//! use dc_client::HttpTaskClient;
//! use dc_store::ProjectStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = select_bridge(&HostEnvironment::none(), Arc::new(MemoryStorage::new()));
//! let client = Arc::new(HttpTaskClient::new("http://127.0.0.1:18500", Duration::from_secs(30))?);
//! let store = ProjectStore::new(bridge, client);
//! store.initialize().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod autosave;
pub mod config;
pub mod error;
pub mod events;
pub mod poller;
pub mod store;

pub use autosave::{Autosave, AutosaveHandle, Job, Scheduler, TokioDebouncer};
pub use config::DreamCanvasConfig;
pub use error::{ConfigError, StoreError};
pub use events::{StoreEvent, Subscription, SubscriptionId};
pub use poller::{pending_task_ids, PollerHandle, TaskPoller};
pub use store::{ProjectStore, StoreSnapshot};
