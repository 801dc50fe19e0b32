//! DreamCanvas data model
//!
//! The shapes shared by every layer of the workbench core:
//! - Project manifests, payloads and listing summaries
//! - Library assets and generation history records
//! - Remote generation tasks and their status lifecycle
//! - Canvas checksums used for unsaved-change detection
//! - Pure mapping from completed tasks to assets and history
//!
//! # Example
//!
//! ```rust
//! use dc_model::{checksum, CanvasSnapshot};
//! use serde_json::json;
//!
//! let snapshot = CanvasSnapshot::new(json!({ "shapes": [] }));
//! let fingerprint = checksum(Some(&snapshot));
//! assert!(fingerprint.starts_with("front-"));
//! ```

#![warn(unreachable_pub)]

pub mod checksum;
pub mod mapper;
pub mod project;
pub mod task;
pub mod time;

pub use checksum::{checksum, is_client_checksum, CLIENT_CHECKSUM_PREFIX};
pub use mapper::{asset_id_for, to_asset, to_history_record, ASSET_SOURCE, LOCAL_SESSION_ID};
pub use project::{
    AssetKind, AssetPayload, CanvasSnapshot, GenerationRecord, Metadata, ProjectManifest,
    ProjectPayload, ProjectSummary, MANIFEST_VERSION,
};
pub use task::{GenerationTask, TaskStatus};
pub use time::now_ms;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
