//! Filesystem-backed native host
//!
//! The host side of [`HostChannel`]: each project is a directory under the
//! projects root holding `manifest.json`, `canvas.json`, `assets.json` and
//! `history.json`. Saving re-stamps `updatedAt` and assigns a SHA-256
//! checksum of the canvas, which is the canonical checksum the bridge
//! hands back to the store.

use crate::host::{HostChannel, HostCommand, HostError};
use async_trait::async_trait;
use dc_model::{
    now_ms, AssetPayload, CanvasSnapshot, GenerationRecord, ProjectManifest, ProjectPayload,
    ProjectSummary,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";
const CANVAS_FILE: &str = "canvas.json";
const ASSETS_FILE: &str = "assets.json";
const HISTORY_FILE: &str = "history.json";

/// Native project host over a directory tree
#[derive(Debug, Clone)]
pub struct FsProjectHost {
    root: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadArgs {
    project_id: String,
}

#[derive(Deserialize)]
struct SaveArgs {
    payload: ProjectPayload,
}

#[derive(Deserialize)]
struct CreateArgs {
    name: String,
}

impl FsProjectHost {
    /// Host rooted at `root`
    ///
    /// # Errors
    /// Returns error if the root directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Projects root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    /// Summaries of every readable project, most recently updated first
    ///
    /// # Errors
    /// Returns error if the root cannot be listed
    pub fn list(&self) -> Result<Vec<ProjectSummary>, HostError> {
        let entries = fs::read_dir(&self.root).map_err(io_failure)?;
        let mut summaries = Vec::new();

        for entry in entries.flatten() {
            let dir = entry.path();
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            let manifest = match read_json::<ProjectManifest>(&manifest_path) {
                Ok(manifest) => manifest,
                Err(err) => {
                    tracing::warn!("Skipping unreadable manifest {}: {}", manifest_path.display(), err);
                    continue;
                }
            };
            let assets = read_json::<Vec<Value>>(&dir.join(ASSETS_FILE)).unwrap_or_default();
            let history = read_json::<Vec<Value>>(&dir.join(HISTORY_FILE)).unwrap_or_default();
            summaries.push(ProjectSummary {
                manifest,
                assets: assets.len(),
                history: history.len(),
            });
        }

        summaries.sort_by(|a, b| b.manifest.updated_at.cmp(&a.manifest.updated_at));
        Ok(summaries)
    }

    /// Load one project
    ///
    /// # Errors
    /// - `HostError::NotFound` if the manifest is missing
    pub fn load(&self, project_id: &str) -> Result<ProjectPayload, HostError> {
        if !is_safe_id(project_id) {
            return Err(HostError::NotFound(project_id.to_string()));
        }
        let dir = self.project_dir(project_id);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(HostError::NotFound(project_id.to_string()));
        }

        let manifest = read_json::<ProjectManifest>(&manifest_path).map_err(io_failure)?;
        let canvas = read_json::<CanvasSnapshot>(&dir.join(CANVAS_FILE)).unwrap_or_default();
        let assets = read_json::<Vec<AssetPayload>>(&dir.join(ASSETS_FILE)).unwrap_or_default();
        let history =
            read_json::<Vec<GenerationRecord>>(&dir.join(HISTORY_FILE)).unwrap_or_default();

        Ok(ProjectPayload {
            manifest,
            canvas,
            assets,
            history,
        })
    }

    /// Write a project, returning its canonical stored form
    ///
    /// # Errors
    /// Returns error for an empty or path-like id, or on write failure
    pub fn save(&self, payload: &ProjectPayload) -> Result<ProjectPayload, HostError> {
        let project_id = payload.manifest.id.as_str();
        if project_id.is_empty() {
            return Err(HostError::Failed("project id is empty".into()));
        }
        if !is_safe_id(project_id) {
            return Err(HostError::Failed(format!("invalid project id: {project_id}")));
        }

        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir).map_err(io_failure)?;

        let manifest = ProjectManifest {
            updated_at: now_ms(),
            canvas_checksum: host_checksum(&payload.canvas),
            ..payload.manifest.clone()
        };

        write_json(&dir.join(MANIFEST_FILE), &manifest).map_err(io_failure)?;
        write_json(&dir.join(CANVAS_FILE), &payload.canvas).map_err(io_failure)?;
        write_json(&dir.join(ASSETS_FILE), &payload.assets).map_err(io_failure)?;
        write_json(&dir.join(HISTORY_FILE), &payload.history).map_err(io_failure)?;

        Ok(ProjectPayload {
            manifest,
            canvas: payload.canvas.clone(),
            assets: payload.assets.clone(),
            history: payload.history.clone(),
        })
    }

    /// Create and persist an empty project
    ///
    /// # Errors
    /// Returns error on write failure
    pub fn create(&self, name: &str) -> Result<ProjectPayload, HostError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.save(&ProjectPayload::new(ProjectManifest::new(id, name)))
    }

    fn dispatch(&self, command: HostCommand, args: Value) -> Result<Value, HostError> {
        match command {
            HostCommand::ListProjects => to_reply(&self.list()?),
            HostCommand::LoadProject => {
                let args: LoadArgs = parse_args(args)?;
                to_reply(&self.load(&args.project_id)?)
            }
            HostCommand::SaveProject => {
                let args: SaveArgs = parse_args(args)?;
                to_reply(&self.save(&args.payload)?)
            }
            HostCommand::CreateProject => {
                let args: CreateArgs = parse_args(args)?;
                to_reply(&self.create(&args.name)?)
            }
        }
    }
}

#[async_trait]
impl HostChannel for FsProjectHost {
    async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostError> {
        let host = self.clone();
        tokio::task::spawn_blocking(move || host.dispatch(command, args))
            .await
            .map_err(|err| HostError::Failed(format!("host worker failed: {err}")))?
    }
}

/// SHA-256 hex digest of the canvas JSON
fn host_checksum(canvas: &CanvasSnapshot) -> String {
    let bytes = serde_json::to_vec(canvas).unwrap_or_default();
    hex::encode(Sha256::digest(bytes))
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, HostError> {
    serde_json::from_value(args).map_err(|err| HostError::Failed(format!("bad arguments: {err}")))
}

fn to_reply<T: Serialize>(value: &T) -> Result<Value, HostError> {
    serde_json::to_value(value).map_err(|err| HostError::Failed(err.to_string()))
}

fn io_failure(err: io::Error) -> HostError {
    HostError::Failed(err.to_string())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)
}
