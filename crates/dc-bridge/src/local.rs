//! Local-storage bridge
//!
//! The entire project list is one JSON array under [`STORAGE_KEY`]. Every
//! save is a whole-array read-modify-write; project counts are small.

use crate::bridge::{BridgeKind, ProjectBridge};
use crate::error::BridgeError;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use dc_model::{ProjectManifest, ProjectPayload, ProjectSummary};
use parking_lot::Mutex;
use std::sync::Arc;

/// Storage key holding the project array
pub const STORAGE_KEY: &str = "dreamcanvas.projects";

/// Bridge over a [`KeyValueStore`]
pub struct LocalStorageBridge {
    storage: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl LocalStorageBridge {
    /// Create bridge over `storage`
    #[inline]
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Read the stored array
    ///
    /// Missing or corrupt content reads as an empty list.
    fn read_store(&self) -> Result<Vec<ProjectPayload>, BridgeError> {
        let Some(raw) = self.storage.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        match parse_store(&raw) {
            Ok(payloads) => Ok(payloads),
            Err(err) => {
                tracing::warn!("Ignoring local project storage: {}", err);
                Ok(Vec::new())
            }
        }
    }

    fn write_store(&self, payloads: &[ProjectPayload]) -> Result<(), BridgeError> {
        let raw = serde_json::to_string(payloads)?;
        self.storage.set(STORAGE_KEY, &raw)?;
        Ok(())
    }

    fn upsert(&self, payload: &ProjectPayload) -> Result<ProjectPayload, BridgeError> {
        if payload.manifest.id.is_empty() {
            return Err(BridgeError::InvalidProject("project id is empty".into()));
        }

        let _guard = self.write_lock.lock();
        let mut payloads = self.read_store()?;
        match payloads
            .iter_mut()
            .find(|stored| stored.manifest.id == payload.manifest.id)
        {
            Some(stored) => *stored = payload.clone(),
            None => payloads.push(payload.clone()),
        }
        self.write_store(&payloads)?;

        tracing::debug!("Saved project {} ({} stored)", payload.manifest.id, payloads.len());
        Ok(payload.clone())
    }
}

impl std::fmt::Debug for LocalStorageBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorageBridge")
            .field("key", &STORAGE_KEY)
            .finish_non_exhaustive()
    }
}

fn parse_store(raw: &str) -> Result<Vec<ProjectPayload>, BridgeError> {
    serde_json::from_str(raw).map_err(|err| BridgeError::StorageCorrupt(err.to_string()))
}

#[async_trait]
impl ProjectBridge for LocalStorageBridge {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, BridgeError> {
        Ok(self.read_store()?.iter().map(ProjectSummary::from).collect())
    }

    async fn load_project(&self, project_id: &str) -> Result<ProjectPayload, BridgeError> {
        self.read_store()?
            .into_iter()
            .find(|payload| payload.manifest.id == project_id)
            .ok_or_else(|| BridgeError::NotFound(project_id.to_string()))
    }

    async fn save_project(&self, payload: &ProjectPayload) -> Result<ProjectPayload, BridgeError> {
        self.upsert(payload)
    }

    async fn create_project(&self, name: &str) -> Result<ProjectPayload, BridgeError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let payload = ProjectPayload::new(ProjectManifest::new(id, name));
        tracing::info!("Creating project {} ({})", payload.manifest.id, name);
        self.upsert(&payload)
    }

    fn kind(&self) -> BridgeKind {
        BridgeKind::LocalStorage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use dc_model::CanvasSnapshot;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bridge() -> (Arc<MemoryStorage>, LocalStorageBridge) {
        let storage = Arc::new(MemoryStorage::new());
        let bridge = LocalStorageBridge::new(storage.clone());
        (storage, bridge)
    }

    #[tokio::test]
    async fn empty_storage_lists_nothing() {
        let (_, bridge) = bridge();
        assert!(bridge.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_storage_reads_as_empty() {
        let (storage, bridge) = bridge();
        storage.set(STORAGE_KEY, "{not json").unwrap();
        assert!(bridge.list_projects().await.unwrap().is_empty());

        let created = bridge.create_project("Recovered").await.unwrap();
        let listed = bridge.list_projects().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].manifest.id, created.manifest.id);
    }

    #[tokio::test]
    async fn create_persists_before_returning() {
        let (storage, bridge) = bridge();
        let created = bridge.create_project("Demo").await.unwrap();

        assert_eq!(created.manifest.name, "Demo");
        assert_eq!(created.manifest.version, "1.0.0");
        assert!(created.manifest.canvas_checksum.is_empty());
        assert!(created.canvas.is_empty());

        let raw = storage.get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains(&created.manifest.id));
    }

    #[tokio::test]
    async fn create_allocates_unique_ids() {
        let (_, bridge) = bridge();
        let a = bridge.create_project("A").await.unwrap();
        let b = bridge.create_project("B").await.unwrap();
        assert_ne!(a.manifest.id, b.manifest.id);
        assert_eq!(bridge.list_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn load_unknown_is_not_found() {
        let (_, bridge) = bridge();
        let err = bridge.load_project("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn save_upserts_in_place() {
        let (_, bridge) = bridge();
        let first = bridge.create_project("First").await.unwrap();
        let second = bridge.create_project("Second").await.unwrap();

        let mut edited = first.clone();
        edited.canvas = CanvasSnapshot::new(json!({"shapes": ["circle"]}));
        let saved = bridge.save_project(&edited).await.unwrap();
        assert_eq!(saved, edited);

        let listed = bridge.list_projects().await.unwrap();
        assert_eq!(listed[0].manifest.id, first.manifest.id);
        assert_eq!(listed[1].manifest.id, second.manifest.id);
        assert_eq!(bridge.load_project(first.id()).await.unwrap(), edited);
    }

    #[tokio::test]
    async fn save_of_untouched_load_is_noop() {
        let (_, bridge) = bridge();
        let created = bridge.create_project("Stable").await.unwrap();
        let loaded = bridge.load_project(created.id()).await.unwrap();
        let saved = bridge.save_project(&loaded).await.unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(bridge.load_project(created.id()).await.unwrap(), loaded);
    }

    #[tokio::test]
    async fn save_rejects_empty_id() {
        let (_, bridge) = bridge();
        let payload = ProjectPayload::new(ProjectManifest::new("", "nameless"));
        assert!(matches!(
            bridge.save_project(&payload).await,
            Err(BridgeError::InvalidProject(_))
        ));
    }
}
