//! Work that must outlive the event handler that started it.
//!
//! A handler that kicks off background work (revalidating a cached asset,
//! closing a notification after a timeout) registers it with
//! `EventLifetime::wait_until`. The host calls `settle` before tearing the
//! worker down; anything not registered may be dropped mid-flight.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::error;

#[derive(Clone, Default)]
pub struct EventLifetime {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl EventLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` and keep the worker alive until it finishes.
    /// Must be called from within a tokio runtime.
    ///
    /// Handles of tasks that already finished are dropped here, so a worker
    /// that is never settled doesn't accumulate them.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every registered task, including tasks registered while
    /// waiting. Returns how many tasks were awaited.
    pub async fn settle(&self) -> usize {
        let mut settled = 0;
        loop {
            let batch: Vec<_> = {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.drain(..).collect()
            };
            if batch.is_empty() {
                return settled;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    error!(error = %e, "Background task failed");
                }
                settled += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_nested_work() {
        let lifetime = EventLifetime::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_lifetime = lifetime.clone();
        let inner_done = done.clone();
        lifetime.wait_until(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let nested_done = inner_done.clone();
            inner_lifetime.wait_until(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(lifetime.settle().await, 2);
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(lifetime.pending(), 0);
    }

    #[tokio::test]
    async fn test_finished_work_is_not_kept_around() {
        let lifetime = EventLifetime::new();
        for _ in 0..10 {
            lifetime.wait_until(async {});
            while lifetime.pending() > 0 {
                tokio::task::yield_now().await;
            }
        }

        lifetime.wait_until(async {});
        assert_eq!(lifetime.settle().await, 1);
    }
}
