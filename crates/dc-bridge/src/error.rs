//! Error types for the persistence bridge

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No project with the requested id
    #[error("project not found: {0}")]
    NotFound(String),

    /// Native host required but not present or disconnected
    #[error("native host unreachable: {0}")]
    Unreachable(String),

    /// Stored content failed to parse
    #[error("storage content corrupt: {0}")]
    StorageCorrupt(String),

    /// Host reported a failure
    #[error("host call failed: {0}")]
    Host(String),

    /// Payload rejected before storage
    #[error("invalid project: {0}")]
    InvalidProject(String),

    /// Storage I/O failure
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the error means the project does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
