//! Contract tests run against both bridge variants.
//!
//! Whatever backend is selected at startup, the store relies on the same
//! observable behavior:
//! - create persists immediately and shows up in the listing
//! - load of an unknown id is NotFound
//! - save of an untouched load does not change content
//! - save upserts by manifest id

use dc_bridge::{
    select_bridge, BridgeError, HostEnvironment, MemoryStorage, ProjectBridge,
};
use dc_model::CanvasSnapshot;
use serde_json::json;
use std::sync::Arc;

fn local_bridge() -> Arc<dyn ProjectBridge> {
    select_bridge(&HostEnvironment::none(), Arc::new(MemoryStorage::new()))
}

fn host_bridge(dir: &tempfile::TempDir) -> Arc<dyn ProjectBridge> {
    let env = HostEnvironment::from_projects_dir(Some(dir.path().join("projects"))).unwrap();
    select_bridge(&env, Arc::new(MemoryStorage::new()))
}

async fn create_then_list(bridge: &dyn ProjectBridge) {
    let created = bridge.create_project("Demo").await.unwrap();
    let listed = bridge.list_projects().await.unwrap();

    let summary = listed
        .iter()
        .find(|s| s.manifest.id == created.manifest.id)
        .expect("created project should be listed");
    assert_eq!(summary.manifest.name, "Demo");
    assert_eq!(summary.assets, 0);
    assert_eq!(summary.history, 0);
}

async fn unknown_is_not_found(bridge: &dyn ProjectBridge) {
    match bridge.load_project("does-not-exist").await {
        Err(BridgeError::NotFound(id)) => assert_eq!(id, "does-not-exist"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

async fn untouched_roundtrip(bridge: &dyn ProjectBridge) {
    let created = bridge.create_project("Stable").await.unwrap();
    let loaded = bridge.load_project(created.id()).await.unwrap();
    let saved = bridge.save_project(&loaded).await.unwrap();

    assert_eq!(saved.canvas, loaded.canvas);
    assert_eq!(saved.assets, loaded.assets);
    assert_eq!(saved.history, loaded.history);
    assert_eq!(saved.manifest.id, loaded.manifest.id);
    assert_eq!(saved.manifest.name, loaded.manifest.name);
    assert_eq!(saved.manifest.canvas_checksum, loaded.manifest.canvas_checksum);
}

async fn save_upserts(bridge: &dyn ProjectBridge) {
    let created = bridge.create_project("Editable").await.unwrap();
    let before = bridge.list_projects().await.unwrap().len();

    let mut edited = created.clone();
    edited.canvas = CanvasSnapshot::new(json!({ "shapes": [{ "kind": "rect" }] }));
    bridge.save_project(&edited).await.unwrap();

    assert_eq!(bridge.list_projects().await.unwrap().len(), before);
    let reloaded = bridge.load_project(created.id()).await.unwrap();
    assert_eq!(reloaded.canvas, edited.canvas);
}

#[tokio::test]
async fn local_storage_bridge_honors_contract() {
    let bridge = local_bridge();
    create_then_list(bridge.as_ref()).await;
    unknown_is_not_found(bridge.as_ref()).await;
    untouched_roundtrip(bridge.as_ref()).await;
    save_upserts(bridge.as_ref()).await;
}

#[tokio::test]
async fn host_bridge_honors_contract() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = host_bridge(&dir);
    create_then_list(bridge.as_ref()).await;
    unknown_is_not_found(bridge.as_ref()).await;
    untouched_roundtrip(bridge.as_ref()).await;
    save_upserts(bridge.as_ref()).await;
}

#[tokio::test]
async fn host_bridge_assigns_canonical_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = host_bridge(&dir);

    let mut project = bridge.create_project("Checksummed").await.unwrap();
    project.manifest.canvas_checksum = dc_model::checksum(Some(&project.canvas));
    let saved = bridge.save_project(&project).await.unwrap();

    assert!(!dc_model::is_client_checksum(&saved.manifest.canvas_checksum));
    assert_ne!(saved.manifest.canvas_checksum, project.manifest.canvas_checksum);
}
