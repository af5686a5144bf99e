//! Outstanding-task accounting
//!
//! Every task a component spawns holds a [`TaskGuard`]; shutdown waits until
//! the counter is back to zero so nothing outlives its owner.
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TaskCounter {
    active: AtomicUsize,
    idle: Notify,
}

impl TaskCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count one task until the returned guard is dropped
    pub fn enter(self: &Arc<Self>) -> TaskGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            counter: Arc::clone(self),
        }
    }

    /// Spawn a counted task
    ///
    /// The count is taken before spawning, so a `wait_idle` that starts
    /// right after this call already sees the task.
    pub fn spawn<F>(self: &Arc<Self>, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.enter();
        tokio::spawn(async move {
            let _guard = guard;
            future.await;
        })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no counted task is running
    pub async fn wait_idle(&self) {
        loop {
            // Registered before the check: notify_waiters reaches it even unpolled
            let notified = self.idle.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Wait until a boolean signal turns true (or its sender is gone)
pub async fn signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|set| *set).await;
}

#[derive(Debug)]
pub struct TaskGuard {
    counter: Arc<TaskCounter>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.counter.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let counter = TaskCounter::new();
        tokio::time::timeout(Duration::from_millis(100), counter.wait_idle())
            .await
            .expect("idle counter should not block");
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_spawned_tasks() {
        let counter = TaskCounter::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        counter.spawn(async move {
            let _ = release_rx.await;
        });
        assert_eq!(counter.active(), 1);

        let waiter = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert_eq!(counter.active(), 0);
    }

    #[tokio::test]
    async fn test_guard_counts_inline_work() {
        let counter = TaskCounter::new();
        let guard = counter.enter();
        let second = counter.enter();
        assert_eq!(counter.active(), 2);
        drop(guard);
        drop(second);
        assert_eq!(counter.active(), 0);
    }
}
