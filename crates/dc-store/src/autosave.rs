//! Debounced autosave
//!
//! [`Autosave`] watches for canvas drift and hands a `persist` job to a
//! [`Scheduler`]. The store itself never owns a timer.

use crate::events::StoreEvent;
use crate::store::ProjectStore;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Deferred unit of work
pub type Job = BoxFuture<'static, ()>;

/// Arm/cancel capability for a single deferred job
pub trait Scheduler: Send + Sync {
    /// Run `job` after `delay`, replacing any job armed earlier
    fn arm(&self, delay: Duration, job: Job);

    /// Drop the armed job, if it has not fired yet
    fn cancel(&self);
}

/// [`Scheduler`] on the tokio timer
///
/// Re-arming aborts the pending timer, so at most one job waits at a time.
/// A job that has already fired runs to completion.
#[derive(Debug, Default)]
pub struct TokioDebouncer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TokioDebouncer {
    /// Create new debouncer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is waiting to fire
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Scheduler for TokioDebouncer {
    fn arm(&self, delay: Duration, job: Job) {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(job);
        });
        if let Some(previous) = self.pending.lock().replace(timer) {
            previous.abort();
        }
    }

    fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

/// Canvas-drift listener driving a [`Scheduler`]
pub struct Autosave;

impl Autosave {
    /// Persist `store` once the canvas has been quiet for `delay`
    #[must_use]
    pub fn spawn(
        store: Arc<ProjectStore>,
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
    ) -> AutosaveHandle {
        let subscription = store.subscribe();
        let listener_scheduler = scheduler.clone();

        let task = tokio::spawn(async move {
            let scheduler = listener_scheduler;
            let mut events = subscription.events;
            while let Some(event) = events.recv().await {
                match event {
                    StoreEvent::CanvasChanged { checksum } if store.has_unsaved_changes() => {
                        tracing::debug!("Autosave armed for canvas {}", checksum);
                        let store = store.clone();
                        scheduler.arm(
                            delay,
                            Box::pin(async move {
                                store.persist().await;
                            }),
                        );
                    }
                    StoreEvent::Persisted { .. } if !store.has_unsaved_changes() => {
                        scheduler.cancel();
                    }
                    _ => {}
                }
            }
        });

        AutosaveHandle { task, scheduler }
    }
}

/// Owner of a running autosave; dropping it stops autosave
pub struct AutosaveHandle {
    task: JoinHandle<()>,
    scheduler: Arc<dyn Scheduler>,
}

impl AutosaveHandle {
    /// Stop listening and drop any armed save
    pub fn shutdown(&self) {
        self.task.abort();
        self.scheduler.cancel();
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AutosaveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveHandle")
            .field("running", &!self.task.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: &Arc<AtomicUsize>) -> Job {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_pending_job() {
        let debouncer = TokioDebouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            debouncer.arm(Duration::from_millis(100), counting_job(&runs));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_armed());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let debouncer = TokioDebouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.arm(Duration::from_millis(100), counting_job(&runs));
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
