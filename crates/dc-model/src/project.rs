//! Project aggregate types
//!
//! A [`ProjectPayload`] is the unit of persistence: manifest, canvas,
//! asset library and generation history travel together. Every type here
//! serializes with camelCase field names, which is the shape shared by the
//! local-storage array, host calls and the task queue.

use crate::time::now_ms;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON metadata attached to assets and tasks
pub type Metadata = Map<String, Value>;

/// Manifest version stamped on newly created projects
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Project identity and bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    /// Unique project identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Creation time (epoch ms)
    pub created_at: u64,
    /// Last observable-content change (epoch ms)
    pub updated_at: u64,
    /// Manifest format version
    pub version: String,
    /// Fingerprint of the last-known canvas content
    #[serde(default)]
    pub canvas_checksum: String,
}

impl ProjectManifest {
    /// Create a manifest stamped with the current time and an empty checksum
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            version: MANIFEST_VERSION.to_string(),
            canvas_checksum: String::new(),
        }
    }
}

/// Opaque drawing-surface document
///
/// Only equality by checksum matters to the core; the content itself is
/// never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasSnapshot(pub Value);

impl CanvasSnapshot {
    /// Wrap a JSON document
    #[inline]
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The empty document (`{}`)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Borrow the underlying JSON
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// True for `null` and `{}`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl Default for CanvasSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for CanvasSnapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Library asset category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Raster image
    Image,
    /// Saved prompt text
    TextPrompt,
    /// Generated UI component
    GeneratedComponent,
}

/// An entry in the project's asset library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPayload {
    /// Asset identifier (`<taskId>-asset` for generated images)
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Category
    pub kind: AssetKind,
    /// Data URI, HTTP URL or file reference
    pub uri: String,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation time (epoch ms)
    pub created_at: u64,
    /// Last update time (epoch ms)
    pub updated_at: u64,
}

/// History entry mirroring one generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// Originating task id
    pub id: String,
    /// Prompt as submitted
    pub prompt: String,
    /// Session that produced the task
    pub session_id: String,
    /// Last known status
    pub status: crate::task::TaskStatus,
    /// Result locations
    #[serde(default)]
    pub result_uris: Vec<String>,
    /// Failure message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Task creation time (epoch ms)
    pub created_at: u64,
    /// Time the task reached a terminal status (epoch ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

/// Aggregate root: the unit of persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    /// Identity and bookkeeping
    pub manifest: ProjectManifest,
    /// Drawing-surface document
    #[serde(default)]
    pub canvas: CanvasSnapshot,
    /// Asset library, most recent first
    #[serde(default)]
    pub assets: Vec<AssetPayload>,
    /// Generation history, most recent first
    #[serde(default)]
    pub history: Vec<GenerationRecord>,
}

impl ProjectPayload {
    /// Create a payload with an empty body
    #[inline]
    #[must_use]
    pub fn new(manifest: ProjectManifest) -> Self {
        Self {
            manifest,
            canvas: CanvasSnapshot::empty(),
            assets: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Project identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Derive the listing projection
    #[inline]
    #[must_use]
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary::from(self)
    }
}

/// Listing projection, always recomputed from a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    /// Manifest of the summarized project
    pub manifest: ProjectManifest,
    /// Number of assets
    pub assets: usize,
    /// Number of history records
    pub history: usize,
}

impl From<&ProjectPayload> for ProjectSummary {
    fn from(payload: &ProjectPayload) -> Self {
        Self {
            manifest: payload.manifest.clone(),
            assets: payload.assets.len(),
            history: payload.history.len(),
        }
    }
}
