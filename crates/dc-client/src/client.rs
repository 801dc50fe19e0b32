//! Generation task submission, status and cancellation
//!
//! Wire contract (every reply wrapped as `{ "task": GenerationTask }`):
//! - `POST /jimeng/tasks` with `{prompt, model, size, batch, projectId}`
//! - `GET /jimeng/history?taskId=<id>`
//! - `POST /jimeng/tasks/{taskId}/cancel`

use crate::error::ClientError;
use async_trait::async_trait;
use dc_model::GenerationTask;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default task queue address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:18500";

/// Model used when a request names none
pub const DEFAULT_MODEL: &str = "sdxl";

/// Output size used when a request names none
pub const DEFAULT_SIZE: &str = "1024x1024";

/// Images per request when a request names none
pub const DEFAULT_BATCH: u32 = 1;

/// A generation request as composed by the prompt UI
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Prompt text
    pub prompt: String,
    /// Model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Output size, `WIDTHxHEIGHT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Number of images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<u32>,
    /// Owning project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl CreateTaskRequest {
    /// Create request for `prompt` with every option unset
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the output size
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the batch count
    #[must_use]
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Set the owning project
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    fn body(&self) -> CreateTaskBody<'_> {
        CreateTaskBody {
            prompt: &self.prompt,
            model: self.model.as_deref().unwrap_or(DEFAULT_MODEL),
            size: self.size.as_deref().unwrap_or(DEFAULT_SIZE),
            batch: self.batch.unwrap_or(DEFAULT_BATCH),
            project_id: self.project_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskBody<'a> {
    prompt: &'a str,
    model: &'a str,
    size: &'a str,
    batch: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    task: GenerationTask,
}

/// Remote generation task queue
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Submit a new task; the server assigns its id and `queued` status
    async fn submit(&self, request: &CreateTaskRequest) -> Result<GenerationTask, ClientError>;

    /// Current status of a task
    ///
    /// Idempotent; safe to call concurrently for different ids.
    async fn fetch_status(&self, task_id: &str) -> Result<GenerationTask, ClientError>;

    /// Request cancellation; the server decides the resulting status
    async fn cancel(&self, task_id: &str) -> Result<GenerationTask, ClientError>;
}

/// [`TaskClient`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpTaskClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTaskClient {
    /// Create client for the queue at `base_url`
    ///
    /// # Errors
    /// Returns error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Queue address
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        endpoint(&self.base_url, segments)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<GenerationTask, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: TaskEnvelope = response.json().await?;
        Ok(envelope.task)
    }
}

#[async_trait]
impl TaskClient for HttpTaskClient {
    async fn submit(&self, request: &CreateTaskRequest) -> Result<GenerationTask, ClientError> {
        let url = self.endpoint(&["jimeng", "tasks"])?;
        tracing::debug!("Submitting task: {}", request.prompt);
        let task = self.send(self.http.post(url).json(&request.body())).await?;
        tracing::info!("Task {} submitted ({})", task.task_id, task.status);
        Ok(task)
    }

    async fn fetch_status(&self, task_id: &str) -> Result<GenerationTask, ClientError> {
        let mut url = self.endpoint(&["jimeng", "history"])?;
        url.query_pairs_mut().append_pair("taskId", task_id);
        self.send(self.http.get(url)).await
    }

    async fn cancel(&self, task_id: &str) -> Result<GenerationTask, ClientError> {
        let url = self.endpoint(&["jimeng", "tasks", task_id, "cancel"])?;
        tracing::info!("Cancelling task {}", task_id);
        self.send(self.http.post(url)).await
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl(
            url::ParseError::RelativeUrlWithCannotBeABaseBase,
        ));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
