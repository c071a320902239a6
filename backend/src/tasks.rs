//! Tracked background tasks.
//!
//! Fire-and-forget work (notification sends) runs in a shared
//! [`tokio::task::JoinSet`] rather than as unmanaged spawns: every task is
//! bounded by its own timeout, panics are observed and logged, and
//! [`BackgroundTasks::drain`] lets shutdown wait for in-flight work to
//! finish before the process exits.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, warn};

/// Default upper bound on a single background task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// A tracked set of fire-and-forget tasks.
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
    task_timeout: Duration,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TIMEOUT)
    }
}

impl BackgroundTasks {
    /// Create an empty set with the given per-task timeout.
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            task_timeout,
        }
    }

    /// Spawn a tracked task. The task is abandoned, with a warning, if it
    /// outlives the per-task timeout; a panic inside it is contained to
    /// the task and logged when observed.
    pub async fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timeout = self.task_timeout;
        let mut tasks = self.tasks.lock().await;
        tasks.spawn(async move {
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!(task = label, ?timeout, "background task abandoned after timeout");
            }
        });
        // Reap tasks that already finished so the set stays bounded.
        while let Some(result) = tasks.try_join_next() {
            observe(result);
        }
    }

    /// Wait for every in-flight task to finish. Called once, after the
    /// server has stopped accepting requests.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            observe(result);
        }
    }

    /// Number of tasks not yet reaped.
    pub async fn pending(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

fn observe(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            error!(error = %err, "background task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn drain_waits_for_spawned_work() {
        let tasks = BackgroundTasks::default();
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        tasks
            .spawn("test-task", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .await;

        tasks.drain().await;
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(tasks.pending().await, 0);
    }

    #[tokio::test]
    async fn overrunning_tasks_are_abandoned_at_the_timeout() {
        let tasks = BackgroundTasks::new(Duration::from_millis(20));
        tasks
            .spawn("stalled-task", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .await;

        // Bounded by the per-task timeout, not the task's own duration.
        tokio::time::timeout(Duration::from_secs(5), tasks.drain())
            .await
            .expect("drain returns once the task is abandoned");
    }

    #[tokio::test]
    async fn a_panicking_task_does_not_poison_the_set() {
        let tasks = BackgroundTasks::default();
        tasks
            .spawn("panicking-task", async {
                panic!("background invariant violated");
            })
            .await;
        tasks.drain().await;

        // The set keeps accepting and completing work.
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        tasks
            .spawn("follow-up-task", async move {
                flag.store(true, Ordering::SeqCst);
            })
            .await;
        tasks.drain().await;
        assert!(done.load(Ordering::SeqCst));
    }
}
