//! The persistence contract shared by every bridge variant

use crate::error::BridgeError;
use async_trait::async_trait;
use dc_model::{ProjectPayload, ProjectSummary};
use std::fmt::{self, Display, Formatter};

/// Which storage backend a bridge talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeKind {
    /// Single keyed entry in local storage
    LocalStorage,
    /// Out-of-process native host
    Host,
}

impl Display for BridgeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalStorage => f.write_str("local-storage"),
            Self::Host => f.write_str("host"),
        }
    }
}

/// List/load/save/create project payloads
///
/// Implementations never retain a reference to a payload after a call
/// returns.
#[async_trait]
pub trait ProjectBridge: Send + Sync {
    /// Summaries of every stored project
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, BridgeError>;

    /// Full payload of one project
    ///
    /// # Errors
    /// - `BridgeError::NotFound` if no project has that id
    async fn load_project(&self, project_id: &str) -> Result<ProjectPayload, BridgeError>;

    /// Upsert by manifest id, returning the canonical stored form
    ///
    /// The returned payload may differ from the input (for example a
    /// host-assigned checksum).
    async fn save_project(&self, payload: &ProjectPayload) -> Result<ProjectPayload, BridgeError>;

    /// Allocate, persist and return a new empty project
    async fn create_project(&self, name: &str) -> Result<ProjectPayload, BridgeError>;

    /// Backend this bridge talks to
    fn kind(&self) -> BridgeKind;
}
