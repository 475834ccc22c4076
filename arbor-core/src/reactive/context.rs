//! Dependency tracking context.
//!
//! A [`Tracker`] collects the paths read while a compute function runs.
//! Rather than living in ambient thread-local state, it travels with the
//! [`PathHandle`](super::PathHandle) given to the compute function: every
//! read made through that handle, or any child of it, is recorded.
//!
//! The tracker is open only for the synchronous part of one compute call.
//! Once the function returns it is closed, so reads made later (for
//! instance after an `.await` inside a deferred computation) are not
//! recorded. Nested computations each get their own tracker and never see
//! each other's reads.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::path::Path;

/// Collector for the dependency set of one compute run.
pub struct Tracker {
    dependencies: Mutex<IndexSet<Path>>,
    open: AtomicBool,
}

impl Tracker {
    /// A fresh, open tracker with an empty dependency set.
    pub fn new() -> Self {
        Self {
            dependencies: Mutex::new(IndexSet::new()),
            open: AtomicBool::new(true),
        }
    }

    /// Record a read of `path`. Ignored once the tracker is closed.
    pub fn track(&self, path: &Path) {
        if self.is_open() {
            self.dependencies.lock().insert(path.clone());
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop recording and return the captured dependency set.
    pub fn close(&self) -> IndexSet<Path> {
        self.open.store(false, Ordering::Release);
        std::mem::take(&mut *self.dependencies.lock())
    }

    /// Dependencies recorded so far.
    pub fn dependencies(&self) -> Vec<Path> {
        self.dependencies.lock().iter().cloned().collect()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("open", &self.is_open())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_records_in_order_without_duplicates() {
        let tracker = Tracker::new();
        tracker.track(&Path::parse("user.first"));
        tracker.track(&Path::parse("user.last"));
        tracker.track(&Path::parse("user.first"));

        assert_eq!(
            tracker.dependencies(),
            vec![Path::parse("user.first"), Path::parse("user.last")]
        );
    }

    #[test]
    fn closed_tracker_ignores_reads() {
        let tracker = Tracker::new();
        tracker.track(&Path::parse("a"));
        let deps = tracker.close();
        assert_eq!(deps.len(), 1);

        tracker.track(&Path::parse("b"));
        assert!(!tracker.is_open());
        assert!(tracker.dependencies().is_empty());
    }

    #[test]
    fn trackers_are_independent() {
        let outer = Tracker::new();
        let inner = Tracker::new();

        outer.track(&Path::parse("a"));
        inner.track(&Path::parse("b"));

        assert_eq!(outer.close().into_iter().collect::<Vec<_>>(), vec![Path::parse("a")]);
        assert_eq!(inner.close().into_iter().collect::<Vec<_>>(), vec![Path::parse("b")]);
    }
}
