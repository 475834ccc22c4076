//! Tokio-backed scheduler.

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

use super::{Scheduler, Task};

/// Forwards tasks and futures to a tokio runtime.
///
/// Turn semantics hold on a current-thread runtime, where a spawned flush
/// cannot start until the code that queued it yields. On a multi-thread
/// runtime the flush may run on another worker while the turn is still in
/// progress; every read it makes is still consistent, but it may observe
/// only part of the turn's writes.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn enqueue(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn current_is_none_outside_runtime() {
        assert!(TokioScheduler::current().is_none());
    }

    #[tokio::test]
    async fn enqueued_task_runs_after_yield() {
        let scheduler = TokioScheduler::current().unwrap();
        let count = Arc::new(AtomicI32::new(0));

        let count_clone = count.clone();
        scheduler.enqueue(Box::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
