//! The project state store
//!
//! Single writer for the open project, the project list and the task table.
//! Every mutation replaces a whole sub-structure under one short write lock,
//! so readers never observe a half-applied update. Locks are never held
//! across a bridge or client call; operations that suspend re-read state
//! when they resume.
//!
//! Errors from `initialize`, `select_project`, `create_new_project` and
//! `persist` land in the `error` banner. `dispatch_task`, `cancel_task` and
//! `reload_task` return them to the caller instead.

use crate::error::StoreError;
use crate::events::{StoreEvent, Subscribers, Subscription, SubscriptionId};
use dc_bridge::{BridgeError, ProjectBridge};
use dc_client::{CreateTaskRequest, TaskClient};
use dc_model::{
    checksum, now_ms, to_asset, to_history_record, CanvasSnapshot, GenerationTask, ProjectPayload,
    ProjectSummary,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

/// Point-in-time copy of the store state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Project summaries, in listing order
    pub projects: Vec<ProjectSummary>,
    /// The open project
    pub current_project: Option<ProjectPayload>,
    /// Known tasks by id
    pub tasks: HashMap<String, GenerationTask>,
    /// A loading operation is in progress
    pub is_loading: bool,
    /// Last store-level error
    pub error: Option<String>,
    /// Canvas checksum of the last load or successful save
    pub last_saved_checksum: Option<String>,
}

impl StoreSnapshot {
    /// Whether the open canvas differs from the last saved one
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.current_project.as_ref().is_some_and(|project| {
            self.last_saved_checksum.as_deref() != Some(project.manifest.canvas_checksum.as_str())
        })
    }
}

#[derive(Debug, Default)]
struct State {
    view: StoreSnapshot,
    /// Bumped on every change to `current_project`
    revision: u64,
}

/// Project/task state store
///
/// Shared as `Arc<ProjectStore>` by whatever composes the UI, the poller and
/// autosave.
pub struct ProjectStore {
    bridge: Arc<dyn ProjectBridge>,
    client: Arc<dyn TaskClient>,
    state: RwLock<State>,
    subscribers: Subscribers,
}

impl ProjectStore {
    /// Create new store over `bridge` and `client`
    #[must_use]
    pub fn new(bridge: Arc<dyn ProjectBridge>, client: Arc<dyn TaskClient>) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            client,
            state: RwLock::new(State::default()),
            subscribers: Subscribers::default(),
        })
    }

    /// Receive change events from now on
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribers.subscribe()
    }

    /// Stop delivering to `id`; returns whether it was subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&self, events: &[StoreEvent]) {
        for event in events {
            self.subscribers.publish(event);
        }
    }

    /// Copy of the whole state
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().view.clone()
    }

    /// The open project
    #[must_use]
    pub fn current_project(&self) -> Option<ProjectPayload> {
        self.state.read().view.current_project.clone()
    }

    /// Project summaries
    #[must_use]
    pub fn projects(&self) -> Vec<ProjectSummary> {
        self.state.read().view.projects.clone()
    }

    /// Task table
    #[must_use]
    pub fn tasks(&self) -> HashMap<String, GenerationTask> {
        self.state.read().view.tasks.clone()
    }

    /// One task by id
    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<GenerationTask> {
        self.state.read().view.tasks.get(task_id).cloned()
    }

    /// Tasks, most recently updated first
    #[must_use]
    pub fn task_list(&self) -> Vec<GenerationTask> {
        let mut tasks: Vec<GenerationTask> = self.state.read().view.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// Whether a loading operation is in progress
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.read().view.is_loading
    }

    /// Last store-level error
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.read().view.error.clone()
    }

    /// Baseline for drift detection
    #[must_use]
    pub fn last_saved_checksum(&self) -> Option<String> {
        self.state.read().view.last_saved_checksum.clone()
    }

    /// Whether the open canvas differs from the last saved one
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.state.read().view.has_unsaved_changes()
    }

    fn begin_loading(&self) {
        let mut events = vec![StoreEvent::LoadingChanged(true)];
        {
            let mut state = self.state.write();
            state.view.is_loading = true;
            if state.view.error.take().is_some() {
                events.push(StoreEvent::ErrorChanged);
            }
        }
        self.publish(&events);
    }

    fn finish_loading(&self) {
        self.state.write().view.is_loading = false;
        self.publish(&[StoreEvent::LoadingChanged(false)]);
    }

    fn clear_error(&self) {
        let cleared = self.state.write().view.error.take().is_some();
        if cleared {
            self.publish(&[StoreEvent::ErrorChanged]);
        }
    }

    fn record_error(&self, operation: &str, err: &impl Display) {
        tracing::warn!("Store {} failed: {}", operation, err);
        self.state.write().view.error = Some(err.to_string());
        self.publish(&[StoreEvent::ErrorChanged]);
    }

    /// Make `payload` the open project with its checksum as baseline
    fn open(&self, payload: ProjectPayload, projects: Option<Vec<ProjectSummary>>) {
        let mut events = Vec::with_capacity(2);
        {
            let mut state = self.state.write();
            if let Some(projects) = projects {
                state.view.projects = projects;
                events.push(StoreEvent::ProjectsChanged);
            }
            state.view.last_saved_checksum = Some(payload.manifest.canvas_checksum.clone());
            state.view.current_project = Some(payload);
            state.revision += 1;
            events.push(StoreEvent::ProjectChanged);
        }
        self.publish(&events);
    }

    /// List projects and open the first one
    ///
    /// Failures are recorded in the error banner; loading is cleared in
    /// every case.
    pub async fn initialize(&self) {
        self.begin_loading();
        if let Err(err) = self.initialize_inner().await {
            self.record_error("initialize", &err);
        }
        self.finish_loading();
    }

    async fn initialize_inner(&self) -> Result<(), BridgeError> {
        let projects = self.bridge.list_projects().await?;
        tracing::info!("Loaded {} project summaries", projects.len());
        let first = projects.first().map(|summary| summary.manifest.id.clone());

        self.state.write().view.projects = projects;
        self.publish(&[StoreEvent::ProjectsChanged]);

        if let Some(project_id) = first {
            let payload = self.bridge.load_project(&project_id).await?;
            self.open(payload, None);
        }
        Ok(())
    }

    /// Load and open a project
    ///
    /// Loading resets the drift baseline: a freshly loaded project is never
    /// unsaved.
    pub async fn select_project(&self, project_id: &str) {
        self.begin_loading();
        match self.bridge.load_project(project_id).await {
            Ok(payload) => {
                tracing::info!("Opened project {} ({})", payload.manifest.id, payload.manifest.name);
                self.open(payload, None);
            }
            Err(err) => self.record_error("select_project", &err),
        }
        self.finish_loading();
    }

    /// Create a project, refresh the list, and open the new project
    pub async fn create_new_project(&self, name: &str) {
        self.begin_loading();
        let result = async {
            let payload = self.bridge.create_project(name).await?;
            let projects = self.bridge.list_projects().await?;
            Ok::<_, BridgeError>((payload, projects))
        }
        .await;
        match result {
            Ok((payload, projects)) => {
                tracing::info!("Created project {} ({})", payload.manifest.id, name);
                self.open(payload, Some(projects));
            }
            Err(err) => self.record_error("create_new_project", &err),
        }
        self.finish_loading();
    }

    /// Replace the open project's canvas in memory
    ///
    /// No-op without an open project. `None` and `null` store as the empty
    /// document. Never persists.
    pub fn update_canvas(&self, snapshot: Option<CanvasSnapshot>) {
        let canvas = snapshot
            .filter(|snapshot| !snapshot.as_value().is_null())
            .unwrap_or_default();
        let fingerprint = checksum(Some(&canvas));

        {
            let mut state = self.state.write();
            let Some(project) = state.view.current_project.as_mut() else {
                return;
            };
            project.canvas = canvas;
            project.manifest.canvas_checksum.clone_from(&fingerprint);
            project.manifest.updated_at = now_ms();
            state.revision += 1;
        }

        tracing::debug!("Canvas changed: {}", fingerprint);
        self.publish(&[StoreEvent::CanvasChanged {
            checksum: fingerprint,
        }]);
    }

    /// Save the open project and reconcile the project list
    ///
    /// No-op without an open project. On failure the baseline is left
    /// unchanged so drift is still detected and a retry remains possible.
    pub async fn persist(&self) {
        let (payload, revision) = {
            let state = self.state.read();
            match &state.view.current_project {
                Some(project) => (project.clone(), state.revision),
                None => return,
            }
        };
        self.clear_error();

        let persisted = match self.bridge.save_project(&payload).await {
            Ok(persisted) => persisted,
            Err(err) => {
                self.record_error("persist", &err);
                return;
            }
        };

        let mut events = vec![StoreEvent::ProjectsChanged];
        {
            let mut state = self.state.write();
            let summary = persisted.summary();
            match state
                .view
                .projects
                .iter_mut()
                .find(|listed| listed.manifest.id == persisted.manifest.id)
            {
                Some(listed) => *listed = summary,
                None => state.view.projects.insert(0, summary),
            }

            let still_open = state
                .view
                .current_project
                .as_ref()
                .is_some_and(|current| current.manifest.id == persisted.manifest.id);
            if still_open {
                let checksum = persisted.manifest.canvas_checksum.clone();
                if state.revision == revision {
                    state.view.current_project = Some(persisted);
                    state.revision += 1;
                    events.push(StoreEvent::ProjectChanged);
                }
                state.view.last_saved_checksum = Some(checksum.clone());
                events.push(StoreEvent::Persisted { checksum });
            }
        }

        tracing::debug!("Persisted project {}", payload.manifest.id);
        self.publish(&events);
    }

    /// Submit a generation task and record it
    ///
    /// The open project's id is attached when the request names none.
    ///
    /// # Errors
    /// - `StoreError::Client` if submission fails
    pub async fn dispatch_task(
        &self,
        mut request: CreateTaskRequest,
    ) -> Result<GenerationTask, StoreError> {
        if request.project_id.is_none() {
            request.project_id = self
                .state
                .read()
                .view
                .current_project
                .as_ref()
                .map(|project| project.manifest.id.clone());
        }

        let task = self.client.submit(&request).await?;
        self.state
            .write()
            .view
            .tasks
            .insert(task.task_id.clone(), task.clone());
        self.publish(&[StoreEvent::TasksChanged]);
        Ok(task)
    }

    /// Merge a task's latest status
    ///
    /// Idempotent. The task table entry is always overwritten. With a
    /// project open, the history record is updated in place or prepended,
    /// and a derived asset is prepended unless one with the same id exists.
    pub fn refresh_task(&self, task: GenerationTask) {
        let mut events = Vec::with_capacity(2);
        {
            let mut state = self.state.write();
            let state = &mut *state;
            if let Some(project) = state.view.current_project.as_mut() {
                let record = to_history_record(&task);
                match project.history.iter().position(|item| item.id == record.id) {
                    Some(index) => project.history[index] = record,
                    None => project.history.insert(0, record),
                }

                if let Some(asset) = to_asset(&project.manifest.id, &task) {
                    if !project.assets.iter().any(|existing| existing.id == asset.id) {
                        tracing::info!("Task {} produced asset {}", task.task_id, asset.id);
                        project.assets.insert(0, asset);
                    }
                }

                project.manifest.updated_at = now_ms();
                state.revision += 1;
                events.push(StoreEvent::ProjectChanged);
            }

            tracing::debug!("Task {} is {}", task.task_id, task.status);
            state.view.tasks.insert(task.task_id.clone(), task);
            events.push(StoreEvent::TasksChanged);
        }
        self.publish(&events);
    }

    /// Request cancellation and merge whatever status the server reports
    ///
    /// # Errors
    /// - `StoreError::Client` if the request fails
    pub async fn cancel_task(&self, task_id: &str) -> Result<GenerationTask, StoreError> {
        let task = self.client.cancel(task_id).await?;
        self.refresh_task(task.clone());
        Ok(task)
    }

    /// Fetch a task's status now and merge it
    ///
    /// # Errors
    /// - `StoreError::Client` if the fetch fails
    pub async fn reload_task(&self, task_id: &str) -> Result<GenerationTask, StoreError> {
        let task = self.client.fetch_status(task_id).await?;
        self.refresh_task(task.clone());
        Ok(task)
    }
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ProjectStore")
            .field("bridge", &self.bridge.kind())
            .field(
                "current_project",
                &state.view.current_project.as_ref().map(ProjectPayload::id),
            )
            .field("tasks", &state.view.tasks.len())
            .field("revision", &state.revision)
            .finish_non_exhaustive()
    }
}
