//! Listener registry.
//!
//! Listeners are callbacks registered against a canonical path key. A key
//! may have listeners before any value exists at that path (a placeholder
//! subscription); they fire once data arrives.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::path::Path;

/// Unique identifier for a registered listener.
///
/// Identity survives re-subscription churn: removing one listener never
/// disturbs another registered under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change callback: `(value at the update path, update path)`.
///
/// The value is `None` when the update path no longer exists (after a
/// delete, or for a placeholder path).
pub type Listener = Arc<dyn Fn(Option<&Value>, &Path) + Send + Sync>;

/// Mapping from canonical path key to the listeners registered there, in
/// registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    by_key: IndexMap<String, IndexMap<ListenerId, Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, listener: Listener) -> ListenerId {
        let id = ListenerId::new();
        self.by_key.entry(key).or_default().insert(id, listener);
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&mut self, key: &str, id: ListenerId) -> bool {
        let Some(listeners) = self.by_key.get_mut(key) else {
            return false;
        };
        let removed = listeners.shift_remove(&id).is_some();
        if listeners.is_empty() {
            self.by_key.shift_remove(key);
        }
        removed
    }

    /// Listeners registered at `key`, cloned so they can be invoked without
    /// holding the registry.
    pub fn snapshot(&self, key: &str) -> Vec<Listener> {
        self.by_key
            .get(key)
            .map(|listeners| listeners.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, key: &str) -> bool {
        self.by_key.get(key).is_some_and(|l| !l.is_empty())
    }

    pub fn count(&self, key: &str) -> usize {
        self.by_key.get(key).map_or(0, IndexMap::len)
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping a subscription does not detach it; call
/// [`Subscription::unsubscribe`], which is idempotent.
pub struct Subscription {
    id: ListenerId,
    key: String,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, key: String, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            key,
            detach: Mutex::new(Some(Box::new(detach))),
        }
    }

    /// A subscription that was never attached to anything.
    pub(crate) fn detached(key: String) -> Self {
        Self {
            id: ListenerId::new(),
            key,
            detach: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Canonical key of the subscribed path.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remove the listener. Calling this more than once does nothing.
    pub fn unsubscribe(&self) {
        let detach = self.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.detach.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
