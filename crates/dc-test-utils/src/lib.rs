//! Testing utilities for DreamCanvas workspace
//!
//! Shared test doubles and fixtures:
//! - [`ScriptedTaskClient`]: per-task status scripts with failure injection
//! - [`RecordingBridge`]: counts saves, keeps the last payload, can fail or hold saves

#![allow(missing_docs)]

use async_trait::async_trait;
use dc_bridge::{BridgeError, BridgeKind, LocalStorageBridge, MemoryStorage, ProjectBridge};
use dc_client::{ClientError, CreateTaskRequest, TaskClient};
use dc_model::{
    CanvasSnapshot, GenerationTask, Metadata, ProjectPayload, ProjectSummary, TaskStatus,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

pub const TEST_PROMPT: &str = "future city";
pub const TEST_IMAGE_URI: &str = "data:image/png;base64,AAA";

pub fn task(task_id: &str, status: TaskStatus) -> GenerationTask {
    GenerationTask {
        task_id: task_id.to_string(),
        prompt: TEST_PROMPT.to_string(),
        status,
        metadata: Metadata::new(),
        result_uris: Vec::new(),
        error_code: None,
        error_message: None,
        created_at: 1_000,
        updated_at: 1_000,
    }
}

pub fn succeeded_task(task_id: &str, uri: &str) -> GenerationTask {
    GenerationTask {
        result_uris: vec![uri.to_string()],
        updated_at: 5_000,
        ..task(task_id, TaskStatus::Succeeded)
    }
}

pub fn failed_task(task_id: &str, message: &str) -> GenerationTask {
    GenerationTask {
        error_code: Some("generation_failed".into()),
        error_message: Some(message.to_string()),
        updated_at: 5_000,
        ..task(task_id, TaskStatus::Failed)
    }
}

/// A canvas with `n` shapes, distinct per `n`
pub fn snapshot(n: usize) -> CanvasSnapshot {
    let shapes: Vec<Value> = (0..n).map(|i| json!({ "kind": "rect", "x": i })).collect();
    CanvasSnapshot::new(json!({ "shapes": shapes }))
}

#[derive(Debug, Clone)]
enum Step {
    Task(GenerationTask),
    Fail { status: u16, body: String },
}

impl Step {
    fn reply(&self) -> Result<GenerationTask, ClientError> {
        match self {
            Self::Task(task) => Ok(task.clone()),
            Self::Fail { status, body } => Err(ClientError::RequestFailed {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// Task client replaying scripted replies
///
/// `submit` allocates `task-1`, `task-2`, ... in `queued`. Each task's
/// `fetch_status` consumes its script front to back and keeps repeating the
/// last step once exhausted. Unscripted ids answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTaskClient {
    next_id: AtomicUsize,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    submitted: Mutex<Vec<CreateTaskRequest>>,
    fetches: Mutex<HashMap<String, usize>>,
    cancels: Mutex<Vec<String>>,
    submit_failure: Mutex<Option<(u16, String)>>,
}

impl ScriptedTaskClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, task: GenerationTask) {
        self.scripts
            .lock()
            .entry(task.task_id.clone())
            .or_default()
            .push_back(Step::Task(task));
    }

    pub fn push_failure(&self, task_id: &str, status: u16, body: &str) {
        self.scripts
            .lock()
            .entry(task_id.to_string())
            .or_default()
            .push_back(Step::Fail {
                status,
                body: body.to_string(),
            });
    }

    pub fn fail_next_submit(&self, status: u16, body: &str) {
        *self.submit_failure.lock() = Some((status, body.to_string()));
    }

    pub fn submitted(&self) -> Vec<CreateTaskRequest> {
        self.submitted.lock().clone()
    }

    pub fn fetch_count(&self, task_id: &str) -> usize {
        self.fetches.lock().get(task_id).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancels.lock().clone()
    }
}

#[async_trait]
impl TaskClient for ScriptedTaskClient {
    async fn submit(&self, request: &CreateTaskRequest) -> Result<GenerationTask, ClientError> {
        if let Some((status, body)) = self.submit_failure.lock().take() {
            return Err(ClientError::RequestFailed { status, body });
        }
        self.submitted.lock().push(request.clone());

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = task(&format!("task-{n}"), TaskStatus::Queued);
        created.prompt.clone_from(&request.prompt);
        if let Some(model) = &request.model {
            created.metadata.insert("model".into(), json!(model));
        }
        if let Some(project_id) = &request.project_id {
            created.metadata.insert("projectId".into(), json!(project_id));
        }
        Ok(created)
    }

    async fn fetch_status(&self, task_id: &str) -> Result<GenerationTask, ClientError> {
        *self.fetches.lock().entry(task_id.to_string()).or_default() += 1;

        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(task_id) else {
            return Err(ClientError::RequestFailed {
                status: 404,
                body: format!("unknown task {task_id}"),
            });
        };
        let step = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match step {
            Some(step) => step.reply(),
            None => Err(ClientError::RequestFailed {
                status: 404,
                body: format!("unknown task {task_id}"),
            }),
        }
    }

    async fn cancel(&self, task_id: &str) -> Result<GenerationTask, ClientError> {
        self.cancels.lock().push(task_id.to_string());
        Ok(GenerationTask {
            updated_at: 3_000,
            ..task(task_id, TaskStatus::Cancelled)
        })
    }
}

/// Bridge wrapper recording saves
///
/// Delegates to an in-memory local-storage bridge unless another inner
/// bridge is given.
pub struct RecordingBridge {
    inner: Arc<dyn ProjectBridge>,
    saves: AtomicUsize,
    last_saved: Mutex<Option<ProjectPayload>>,
    failing: AtomicBool,
    holding: AtomicBool,
    gate: Semaphore,
    save_started: Notify,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::wrap(Arc::new(LocalStorageBridge::new(Arc::new(MemoryStorage::new()))))
    }

    pub fn wrap(inner: Arc<dyn ProjectBridge>) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            last_saved: Mutex::new(None),
            failing: AtomicBool::new(false),
            holding: AtomicBool::new(false),
            gate: Semaphore::new(0),
            save_started: Notify::new(),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last_saved(&self) -> Option<ProjectPayload> {
        self.last_saved.lock().clone()
    }

    /// Fail every operation with `BridgeError::Host`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make saves wait for [`release_save`](Self::release_save)
    pub fn hold_saves(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Let one held save proceed
    pub fn release_save(&self) {
        self.gate.add_permits(1);
    }

    /// Resolves once a save has begun
    pub async fn save_started(&self) {
        self.save_started.notified().await;
    }

    fn check(&self) -> Result<(), BridgeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Host("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for RecordingBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectBridge for RecordingBridge {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, BridgeError> {
        self.check()?;
        self.inner.list_projects().await
    }

    async fn load_project(&self, project_id: &str) -> Result<ProjectPayload, BridgeError> {
        self.check()?;
        self.inner.load_project(project_id).await
    }

    async fn save_project(&self, payload: &ProjectPayload) -> Result<ProjectPayload, BridgeError> {
        self.save_started.notify_one();
        if self.holding.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let saved = self.inner.save_project(payload).await?;
        *self.last_saved.lock() = Some(saved.clone());
        Ok(saved)
    }

    async fn create_project(&self, name: &str) -> Result<ProjectPayload, BridgeError> {
        self.check()?;
        self.inner.create_project(name).await
    }

    fn kind(&self) -> BridgeKind {
        self.inner.kind()
    }
}
