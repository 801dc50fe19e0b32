//! Backend health probing
//!
//! Not part of the state core; the UI uses it for online/offline labels.

use crate::client::{endpoint, parse_base_url};
use crate::error::ClientError;
use dc_model::now_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

/// `/healthz` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok` when healthy
    pub status: String,
    /// Deployment phase
    #[serde(default)]
    pub phase: String,
    /// Backend version
    #[serde(default)]
    pub version: String,
}

/// Latest probe outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendHealth {
    /// Last successful reply, `None` after a failure
    pub status: Option<HealthStatus>,
    /// When the last probe finished (epoch ms)
    pub last_checked: Option<u64>,
    /// Failure of the last probe
    pub error: Option<String>,
}

impl BackendHealth {
    /// Whether the last probe succeeded
    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status.is_some() && self.error.is_none()
    }

    fn from_probe(result: Result<HealthStatus, ClientError>) -> Self {
        let last_checked = Some(now_ms());
        match result {
            Ok(status) => Self {
                status: Some(status),
                last_checked,
                error: None,
            },
            Err(err) => Self {
                status: None,
                last_checked,
                error: Some(err.to_string()),
            },
        }
    }
}

/// One-shot `GET /healthz`
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: reqwest::Client,
    url: Url,
}

impl HealthProbe {
    /// Create probe for the backend at `base_url`
    ///
    /// # Errors
    /// Returns error if `base_url` is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let url = endpoint(&parse_base_url(base_url)?, &["healthz"])?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    /// Probe once
    ///
    /// # Errors
    /// - `ClientError::RequestFailed` on a non-success status
    /// - `ClientError::Transport` if the backend cannot be reached
    pub async fn probe(&self) -> Result<HealthStatus, ClientError> {
        let response = self.http.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

/// Probes on a fixed interval and publishes the latest [`BackendHealth`]
///
/// Probing stops when the monitor is stopped or dropped.
#[derive(Debug)]
pub struct HealthMonitor {
    state: watch::Receiver<BackendHealth>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start probing: once immediately, then every `interval`
    #[must_use]
    pub fn spawn(probe: HealthProbe, interval: Duration) -> Self {
        let (tx, state) = watch::channel(BackendHealth::default());
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let health = BackendHealth::from_probe(probe.probe().await);
                if let Some(error) = &health.error {
                    tracing::debug!("Backend health probe failed: {}", error);
                }
                if tx.send(health).is_err() {
                    break;
                }
            }
        });
        Self { state, task }
    }

    /// Latest published health
    #[must_use]
    pub fn current(&self) -> BackendHealth {
        self.state.borrow().clone()
    }

    /// Receiver notified on every probe
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BackendHealth> {
        self.state.clone()
    }

    /// Stop probing
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_requires_status_without_error() {
        let online = BackendHealth::from_probe(Ok(HealthStatus {
            status: "ok".into(),
            phase: "dev".into(),
            version: String::new(),
        }));
        assert!(online.is_online());
        assert!(online.last_checked.is_some());

        let offline = BackendHealth::from_probe(Err(ClientError::RequestFailed {
            status: 503,
            body: "starting".into(),
        }));
        assert!(!offline.is_online());
        assert_eq!(offline.error.as_deref(), Some("request failed: 503 starting"));
        assert!(!BackendHealth::default().is_online());
    }

    #[test]
    fn status_tolerates_missing_version() {
        let status: HealthStatus =
            serde_json::from_value(serde_json::json!({ "status": "ok", "phase": "P1" })).unwrap();
        assert_eq!(status.phase, "P1");
        assert!(status.version.is_empty());
    }
}
