//! Error types for the task queue client

/// Remote call failures
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Server answered with a non-success status
    #[error("request failed: {status} {body}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Response body as text
        body: String,
    },

    /// Connection, timeout or response decoding failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Base URL or task id did not form a valid URL
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ClientError {
    /// HTTP status of a `RequestFailed` error
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
