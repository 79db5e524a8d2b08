//! Tracking of per-event tasks.
//!
//! Every change event runs on its own task. The tasks are kept in a shared
//! [`JoinSet`] so shutdown can wait for in-flight dispatches instead of
//! dropping them with the runtime.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

type Tasks = Option<JoinSet<()>>;

fn lock(tasks: &Mutex<Tasks>) -> MutexGuard<'_, Tasks> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-event tasks shared by every ingress.
///
/// Cloning shares the same set. After [`EventTasks::drain`] no new task is
/// accepted.
#[derive(Clone)]
pub struct EventTasks {
    tasks: Arc<Mutex<Tasks>>,
}

impl Default for EventTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTasks {
    /// Create an empty task set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Some(JoinSet::new()))),
        }
    }

    /// Run `task` on the runtime, tracked until it finishes.
    ///
    /// Returns `false` when the set was already drained; the task is dropped.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = lock(&self.tasks);
        let Some(set) = tasks.as_mut() else {
            warn!("Change event arrived after shutdown, dropping it");
            return false;
        };

        // Reap finished tasks so the set only holds in-flight work
        while let Some(result) = set.try_join_next() {
            log_join(result);
        }
        set.spawn(task);
        true
    }

    /// Number of tracked tasks, finished or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.tasks).as_ref().map_or(0, JoinSet::len)
    }

    /// Whether no task is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting tasks and wait up to `grace` for the running ones.
    ///
    /// Tasks still running at the deadline are aborted. Returns how many.
    pub async fn drain(&self, grace: Duration) -> usize {
        let taken = {
            let mut tasks = lock(&self.tasks);
            tasks.take()
        };
        let Some(mut set) = taken else {
            return 0;
        };

        if !set.is_empty() {
            info!(pending = set.len(), "Waiting for in-flight change events");
        }

        let finished = tokio::time::timeout(grace, async {
            while let Some(result) = set.join_next().await {
                log_join(result);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let aborted = set.len();
        warn!(
            aborted,
            grace_secs = grace.as_secs(),
            "Aborting change events still running at shutdown"
        );
        set.shutdown().await;
        aborted
    }
}

fn log_join(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(error = %e, "Change event task panicked"),
        Err(e) => debug!(error = %e, "Change event task cancelled"),
    }
}
