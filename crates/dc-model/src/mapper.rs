//! Task result mapping
//!
//! Pure conversions from a task snapshot into the project-side records it
//! produces. Asset ids are derived from the task id, so re-mapping the same
//! succeeded task always yields the same asset id and callers can
//! deduplicate on it.

use crate::project::{AssetKind, AssetPayload, GenerationRecord, Metadata};
use crate::task::{GenerationTask, TaskStatus};
use crate::time::now_ms;
use serde_json::Value;

/// Session id stamped on history records produced by this client
pub const LOCAL_SESSION_ID: &str = "local";

/// `source` metadata value for generated assets
pub const ASSET_SOURCE: &str = "jimeng";

/// Deterministic asset id for a task
#[inline]
#[must_use]
pub fn asset_id_for(task_id: &str) -> String {
    format!("{task_id}-asset")
}

/// Library asset produced by a task, if any
///
/// Only a succeeded task with at least one result yields an asset; the
/// first result URI is used.
#[must_use]
pub fn to_asset(project_id: &str, task: &GenerationTask) -> Option<AssetPayload> {
    if task.status != TaskStatus::Succeeded {
        return None;
    }
    let uri = task.result_uris.first()?;
    let now = now_ms();

    let mut metadata = Metadata::new();
    metadata.insert("prompt".into(), Value::String(task.prompt.clone()));
    metadata.insert("source".into(), Value::String(ASSET_SOURCE.into()));
    metadata.insert("generatedAt".into(), Value::from(now));

    Some(AssetPayload {
        id: asset_id_for(&task.task_id),
        project_id: project_id.to_string(),
        kind: AssetKind::Image,
        uri: uri.clone(),
        metadata,
        created_at: now,
        updated_at: now,
    })
}

/// History record for a task, whatever its status
///
/// Every terminal status, cancellation included, stamps `completed_at`
/// with the task's last update time.
#[must_use]
pub fn to_history_record(task: &GenerationTask) -> GenerationRecord {
    GenerationRecord {
        id: task.task_id.clone(),
        prompt: task.prompt.clone(),
        session_id: LOCAL_SESSION_ID.to_string(),
        status: task.status,
        result_uris: task.result_uris.clone(),
        error: task.error_message.clone(),
        created_at: task.created_at,
        completed_at: task.is_terminal().then_some(task.updated_at),
    }
}
