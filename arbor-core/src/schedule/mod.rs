//! Task Scheduling
//!
//! The store never decides *when* deferred work runs. It hands two kinds of
//! work to an injected [`Scheduler`]:
//!
//! - **Tasks**: the notification flush, queued once per turn. A scheduler
//!   must run a task after the current synchronous turn completes and
//!   before the next external event is processed (a microtask boundary).
//!
//! - **Futures**: the continuations of deferred computed properties. These
//!   run across turns and write their result into the tree when they
//!   resolve.
//!
//! Two implementations are provided:
//!
//! - [`ManualScheduler`]: a queue driven explicitly by the host, so tests
//!   and embedders can step turns deterministically.
//! - [`TokioScheduler`]: forwards both kinds of work to a tokio runtime.

mod manual;
mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

use futures_util::future::BoxFuture;

/// A unit of deferred synchronous work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executor for deferred store work.
pub trait Scheduler: Send + Sync {
    /// Run `task` at the end of the current turn.
    fn enqueue(&self, task: Task);

    /// Drive `future` to completion.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}
