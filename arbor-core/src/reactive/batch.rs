//! Notification Batching
//!
//! Writes do not call listeners directly. Each write queues one pending
//! entry for its own path and one for every ancestor, down to the root,
//! all tagged with the path that actually changed. The first write of a
//! turn asks the scheduler for a flush; later writes in the same turn only
//! add entries.
//!
//! A flush clears the scheduled flag *before* delivering, so a listener
//! that writes to the store schedules a fresh flush instead of being folded
//! into the one in progress.

use std::collections::HashSet;

use super::path::Path;

/// One queued delivery: listeners at `queue_for` learn that `update_path`
/// changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingNotification {
    pub queue_for: String,
    pub update_path: Path,
}

/// Pending entries for the current turn and the scheduling flag.
#[derive(Debug)]
pub struct NotificationBatch {
    entries: Vec<PendingNotification>,
    seen: HashSet<PendingNotification>,
    scheduled: bool,
    dedupe: bool,
}

impl NotificationBatch {
    /// With `dedupe`, an entry identical to one already queued this turn is
    /// dropped. Entries with different update paths are always kept.
    pub fn new(dedupe: bool) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            scheduled: false,
            dedupe,
        }
    }

    /// Queue entries for `path` and all of its ancestors.
    ///
    /// Returns `true` when the caller must schedule a flush.
    pub fn queue(&mut self, path: &Path) -> bool {
        for len in (0..=path.len()).rev() {
            let entry = PendingNotification {
                queue_for: path.prefix(len).key(),
                update_path: path.clone(),
            };
            if self.dedupe && !self.seen.insert(entry.clone()) {
                continue;
            }
            self.entries.push(entry);
        }

        if self.scheduled {
            false
        } else {
            self.scheduled = true;
            true
        }
    }

    /// Start a flush: clear the scheduled flag and hand over the entries in
    /// insertion order.
    pub fn take(&mut self) -> Vec<PendingNotification> {
        self.scheduled = false;
        self.seen.clear();
        std::mem::take(&mut self.entries)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
