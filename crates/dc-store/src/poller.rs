//! Task status polling
//!
//! The set of tasks to poll is fixed when the timer is armed. Any change to
//! the task table re-arms it with the then-pending set, so a task submitted
//! mid-cycle is picked up on the next arming rather than the current cycle.

use crate::events::StoreEvent;
use crate::store::ProjectStore;
use dc_client::TaskClient;
use dc_model::GenerationTask;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Ids of tasks not yet in a terminal status, sorted
#[must_use]
pub fn pending_task_ids(tasks: &HashMap<String, GenerationTask>) -> Vec<String> {
    let mut pending: Vec<String> = tasks
        .values()
        .filter(|task| !task.is_terminal())
        .map(|task| task.task_id.clone())
        .collect();
    pending.sort();
    pending
}

/// Recurring refresh of non-terminal tasks
pub struct TaskPoller;

impl TaskPoller {
    /// Start polling `store`'s pending tasks through `client` every `interval`
    ///
    /// The first cycle runs one full interval after arming. Fetch failures are
    /// logged and skipped per task; the previous status stays in place.
    #[must_use]
    pub fn spawn(
        store: Arc<ProjectStore>,
        client: Arc<dyn TaskClient>,
        interval: Duration,
    ) -> PollerHandle {
        let gate = Arc::new(CancelGate::default());
        let subscription = store.subscribe();
        let flag = gate.clone();

        let task = tokio::spawn(async move {
            let mut events = subscription.events;
            let mut pending = pending_task_ids(&store.tasks());
            let mut ticker = arm(interval);
            tracing::debug!("Task poller armed with {} pending", pending.len());

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(StoreEvent::TasksChanged) => {
                            pending = pending_task_ids(&store.tasks());
                            ticker = arm(interval);
                        }
                        Some(_) => {}
                        None => break,
                    },
                    _ = ticker.tick(), if !pending.is_empty() => {
                        poll_cycle(&store, client.as_ref(), &pending, &flag).await;
                    }
                }
                if flag.is_cancelled() {
                    break;
                }
            }
            store.unsubscribe(subscription.id);
        });

        PollerHandle { gate, task }
    }
}

/// Cancellation flag that store mutations run under
///
/// `cancel` waits for any mutation already admitted, so nothing admitted
/// before it can land after it returns.
#[derive(Debug, Default)]
struct CancelGate {
    cancelled: RwLock<bool>,
}

impl CancelGate {
    fn cancel(&self) {
        *self.cancelled.write() = true;
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.read()
    }

    /// Run `mutation` unless cancelled; `false` if it was skipped
    fn run_unless_cancelled(&self, mutation: impl FnOnce()) -> bool {
        let cancelled = self.cancelled.read();
        if *cancelled {
            return false;
        }
        mutation();
        true
    }
}

fn arm(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn poll_cycle(
    store: &ProjectStore,
    client: &dyn TaskClient,
    pending: &[String],
    gate: &CancelGate,
) {
    let results = join_all(pending.iter().map(|task_id| async move {
        (task_id, client.fetch_status(task_id).await)
    }))
    .await;

    for (task_id, result) in results {
        match result {
            Ok(task) => {
                if !gate.run_unless_cancelled(|| store.refresh_task(task)) {
                    return;
                }
            }
            Err(err) => tracing::warn!("Polling task {} failed: {}", task_id, err),
        }
    }
}

/// Owner of a running poller; dropping it stops polling
#[derive(Debug)]
pub struct PollerHandle {
    gate: Arc<CancelGate>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling
    ///
    /// Waits out a refresh already being applied; no store mutation from this
    /// poller happens after it returns.
    pub fn shutdown(&self) {
        self.gate.cancel();
        self.task.abort();
    }

    /// Whether the poller task is still alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
