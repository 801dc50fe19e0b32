//! Native-host bridge
//!
//! Each bridge operation becomes one call over a [`HostChannel`]. The
//! transport is the channel's concern; this side only shapes arguments and
//! decodes replies. Host failures propagate as-is.

use crate::bridge::{BridgeKind, ProjectBridge};
use crate::error::BridgeError;
use async_trait::async_trait;
use dc_model::{ProjectPayload, ProjectSummary};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// Commands understood by the native host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    /// `list_projects {}`
    ListProjects,
    /// `load_project { projectId }`
    LoadProject,
    /// `save_project { payload }`
    SaveProject,
    /// `create_project { name }`
    CreateProject,
}

impl HostCommand {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListProjects => "list_projects",
            Self::LoadProject => "load_project",
            Self::SaveProject => "save_project",
            Self::CreateProject => "create_project",
        }
    }
}

/// Failures reported by the host side
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Requested project does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other host-side failure
    #[error("{0}")]
    Failed(String),
}

/// Opaque RPC to the native host process
#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Invoke `command` with JSON `args`, returning the JSON reply
    async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostError>;

    /// Whether the host is still reachable
    fn is_connected(&self) -> bool {
        true
    }
}

/// Bridge delegating to a native host
#[derive(Clone)]
pub struct HostBridge {
    channel: Arc<dyn HostChannel>,
}

impl HostBridge {
    /// Create bridge over `channel`
    #[inline]
    #[must_use]
    pub fn new(channel: Arc<dyn HostChannel>) -> Self {
        Self { channel }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        command: HostCommand,
        args: Value,
    ) -> Result<T, BridgeError> {
        if !self.channel.is_connected() {
            return Err(BridgeError::Unreachable(format!(
                "host disconnected before {}",
                command.as_str()
            )));
        }

        tracing::debug!("Host call {}", command.as_str());
        let reply = self.channel.invoke(command, args).await.map_err(|err| match err {
            HostError::NotFound(id) => BridgeError::NotFound(id),
            HostError::Failed(message) => BridgeError::Host(message),
        })?;
        Ok(serde_json::from_value(reply)?)
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("connected", &self.channel.is_connected())
            .finish()
    }
}

#[async_trait]
impl ProjectBridge for HostBridge {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, BridgeError> {
        self.call(HostCommand::ListProjects, json!({})).await
    }

    async fn load_project(&self, project_id: &str) -> Result<ProjectPayload, BridgeError> {
        self.call(HostCommand::LoadProject, json!({ "projectId": project_id }))
            .await
    }

    async fn save_project(&self, payload: &ProjectPayload) -> Result<ProjectPayload, BridgeError> {
        self.call(HostCommand::SaveProject, json!({ "payload": payload }))
            .await
    }

    async fn create_project(&self, name: &str) -> Result<ProjectPayload, BridgeError> {
        self.call(HostCommand::CreateProject, json!({ "name": name }))
            .await
    }

    fn kind(&self) -> BridgeKind {
        BridgeKind::Host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingChannel {
        calls: Mutex<Vec<(HostCommand, Value)>>,
        reply: Mutex<Option<Result<Value, HostError>>>,
        disconnected: AtomicBool,
    }

    #[async_trait]
    impl HostChannel for RecordingChannel {
        async fn invoke(&self, command: HostCommand, args: Value) -> Result<Value, HostError> {
            self.calls.lock().push((command, args));
            self.reply
                .lock()
                .take()
                .unwrap_or_else(|| Err(HostError::Failed("no reply scripted".into())))
        }

        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn command_wire_names() {
        let names: Vec<_> = [
            HostCommand::ListProjects,
            HostCommand::LoadProject,
            HostCommand::SaveProject,
            HostCommand::CreateProject,
        ]
        .into_iter()
        .map(HostCommand::as_str)
        .collect();
        assert_eq!(
            names,
            vec!["list_projects", "load_project", "save_project", "create_project"]
        );
    }

    #[tokio::test]
    async fn load_sends_project_id() {
        let channel = Arc::new(RecordingChannel::default());
        *channel.reply.lock() = Some(Err(HostError::NotFound("p-9".into())));
        let bridge = HostBridge::new(channel.clone());

        let err = bridge.load_project("p-9").await.unwrap_err();
        assert!(err.is_not_found());

        let calls = channel.calls.lock();
        assert_eq!(calls[0].0, HostCommand::LoadProject);
        assert_eq!(calls[0].1, json!({ "projectId": "p-9" }));
    }

    #[tokio::test]
    async fn host_failures_propagate() {
        let channel = Arc::new(RecordingChannel::default());
        *channel.reply.lock() = Some(Err(HostError::Failed("disk full".into())));
        let bridge = HostBridge::new(channel);

        match bridge.create_project("x").await {
            Err(BridgeError::Host(message)) => assert_eq!(message, "disk full"),
            other => panic!("expected host error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnected_host_is_unreachable() {
        let channel = Arc::new(RecordingChannel::default());
        channel.disconnected.store(true, Ordering::SeqCst);
        let bridge = HostBridge::new(channel.clone());

        assert!(matches!(
            bridge.list_projects().await,
            Err(BridgeError::Unreachable(_))
        ));
        assert!(channel.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_is_serialization_error() {
        let channel = Arc::new(RecordingChannel::default());
        *channel.reply.lock() = Some(Ok(json!({ "unexpected": true })));
        let bridge = HostBridge::new(channel);

        assert!(matches!(
            bridge.list_projects().await,
            Err(BridgeError::Serialization(_))
        ));
    }
}
