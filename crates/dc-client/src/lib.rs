//! DreamCanvas remote task queue client
//!
//! - [`TaskClient`]: submit, status fetch and cancellation of generation tasks
//! - [`HttpTaskClient`]: the `/jimeng` HTTP contract over reqwest
//! - [`HealthProbe`] / [`HealthMonitor`]: `/healthz` polling for online/offline labelling

#![warn(unreachable_pub)]

pub mod client;
pub mod error;
pub mod health;

pub use client::{
    CreateTaskRequest, HttpTaskClient, TaskClient, DEFAULT_BASE_URL, DEFAULT_BATCH, DEFAULT_MODEL,
    DEFAULT_SIZE,
};
pub use error::ClientError;
pub use health::{BackendHealth, HealthMonitor, HealthProbe, HealthStatus};
