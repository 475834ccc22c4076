//! Host-driven scheduler.

use std::collections::VecDeque;
use std::mem;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::task::noop_waker;
use parking_lot::Mutex;

use super::{Scheduler, Task};

/// A scheduler whose queue only advances when the host drives it.
///
/// Nothing runs until [`ManualScheduler::run_until_stalled`] (or
/// [`ManualScheduler::run_tasks`]) is called, which makes every turn
/// boundary explicit. Spawned futures are polled on each drive; futures
/// woken by their own sources (channels, timers owned elsewhere) make
/// progress the next time the host drives the queue.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<VecDeque<Task>>,
    futures: Mutex<FuturesUnordered<BoxFuture<'static, ()>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Number of spawned futures that have not completed.
    pub fn pending_futures(&self) -> usize {
        self.futures.lock().len()
    }

    /// Run queued tasks, including tasks queued by the tasks themselves,
    /// until the queue is empty. Returns the number of tasks run.
    pub fn run_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // The lock is released before the task runs so it can enqueue.
            let next = self.tasks.lock().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Poll spawned futures once. Returns the number that completed.
    pub fn poll_futures(&self) -> usize {
        let mut running = mem::take(&mut *self.futures.lock());
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut completed = 0;
        while let Poll::Ready(Some(())) = running.poll_next_unpin(&mut cx) {
            completed += 1;
        }

        // Futures spawned while polling landed in the (now empty) shared set.
        let mut futures = self.futures.lock();
        running.extend(mem::take(&mut *futures));
        *futures = running;
        completed
    }

    /// Alternate between tasks and futures until neither makes progress.
    /// Returns the number of tasks run.
    pub fn run_until_stalled(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_tasks();
            let completed = self.poll_futures();
            total += ran;
            if ran == 0 && completed == 0 && self.pending_tasks() == 0 {
                return total;
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn enqueue(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.futures.lock().push(future);
    }
}
