//! Background work a handler leaves behind.
//!
//! Store writes and revalidation fetches run detached from the response. The
//! host must drain this set before shutting the worker down, or the writes
//! are lost.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

#[derive(Default)]
struct Tasks {
    queued: JoinSet<()>,
    /// Taken out by a running drain and not yet joined.
    draining: usize,
}

/// Shared set of detached tasks.
#[derive(Clone, Default)]
pub struct PendingWork {
    tasks: Arc<Mutex<Tasks>>,
}

impl PendingWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background and track it until drained.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.queued.try_join_next().is_some() {}
        tasks.queued.spawn(task);
    }

    /// Tasks spawned and not yet reaped, including those a drain is waiting on.
    pub fn len(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.queued.len() + tasks.draining
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked task, including tasks spawned while draining.
    /// Returns the number of tasks joined.
    pub async fn drain(&self) -> usize {
        let mut joined = 0;
        loop {
            let mut batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                let batch = std::mem::take(&mut tasks.queued);
                tasks.draining += batch.len();
                batch
            };
            if batch.is_empty() {
                return joined;
            }
            while let Some(result) = batch.join_next().await {
                joined += 1;
                self.tasks.lock().unwrap_or_else(PoisonError::into_inner).draining -= 1;
                if let Err(err) = result {
                    tracing::warn!(error = %err, "background task did not complete");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_drain_waits_for_tasks() {
        let pending = PendingWork::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            pending.spawn(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(pending.drain().await, 3);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_drain_includes_tasks_spawned_while_draining() {
        let pending = PendingWork::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner = pending.clone();
        let counter = done.clone();
        pending.spawn(async move {
            let counter = counter.clone();
            inner.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(pending.drain().await, 2);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_survives_panicking_task() {
        let pending = PendingWork::new();
        pending.spawn(async { panic!("boom") });
        assert_eq!(pending.drain().await, 1);
    }

    #[tokio::test]
    async fn test_len_counts_tasks_while_draining() {
        let pending = PendingWork::new();
        let (finish, finished) = tokio::sync::oneshot::channel::<()>();
        pending.spawn(async move {
            let _ = finished.await;
        });

        let draining = pending.clone();
        let drain = tokio::spawn(async move { draining.drain().await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(pending.len(), 1);

        finish.send(()).unwrap();
        assert_eq!(drain.await.unwrap(), 1);
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn test_drain_empty() {
        assert_eq!(PendingWork::new().drain().await, 0);
    }
}
