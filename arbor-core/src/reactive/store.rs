//! Reactive Store
//!
//! The store owns the state tree, the listener registry, the computed
//! metadata and the pending notification batch. Everything outside reaches
//! the tree through [`PathHandle`]s.
//!
//! # How It Works
//!
//! 1. A write compares the new value with the old one. Equal writes are
//!    dropped; anything else updates the tree and queues notifications for
//!    the written path and all of its ancestors.
//!
//! 2. The first queued notification of a turn hands a flush task to the
//!    scheduler.
//!
//! 3. The flush reads the current value at each update path and calls the
//!    listeners registered at the queued path.
//!
//! 4. Computed properties are listeners too: their recompute callback sits
//!    at every dependency path and writes the new result back through the
//!    same primitives.
//!
//! # Locking
//!
//! All state sits behind a single mutex. It is held only for the duration
//! of one primitive and is never held while user code runs (compute
//! functions, listeners, sort comparators), so any of those may freely call
//! back into the store.

use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::future::FutureExt;
use indexmap::IndexSet;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::batch::NotificationBatch;
use super::computed::{erase, ComputeFn, ComputedEntry, Derived, IntoComputeResult, MetaNode};
use super::context::Tracker;
use super::handle::PathHandle;
use super::inspect::DebugView;
use super::listener::{Listener, ListenerRegistry, Subscription};
use super::path::Path;
use super::tree;
use crate::config::StoreConfig;
use crate::error::{ComputeError, Result, StoreError};
use crate::schedule::{ManualScheduler, Scheduler};

struct Core {
    tree: Value,
    listeners: ListenerRegistry,
    computed: MetaNode,
    batch: NotificationBatch,
    generation: u64,
}

struct Shared {
    core: Mutex<Core>,
    scheduler: Arc<dyn Scheduler>,
    config: StoreConfig,
}

/// A path-addressed reactive state container.
///
/// Cloning a store is cheap and yields another reference to the same
/// state.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Arc::new(ManualScheduler::new());
/// let store = Store::new(json!({ "user": { "first": "Bob", "last": "Smith" } }), scheduler.clone());
///
/// store.at("user.full").set_computed(|s: &PathHandle| {
///     json!(format!("{} {}", s.at("user.first"), s.at("user.last")))
/// })?;
///
/// store.at("user.first").set("Jim")?;
/// scheduler.run_until_stalled();
/// assert_eq!(store.at("user.full").get(), Some(json!("Jim Smith")));
/// ```
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

/// Non-owning reference to a [`Store`], held by callbacks the store itself
/// keeps alive.
#[derive(Clone)]
pub(crate) struct WeakStore {
    shared: Weak<Shared>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.shared.upgrade().map(|shared| Store { shared })
    }
}

impl Store {
    /// Create a store seeded with `state`, scheduling deferred work on
    /// `scheduler`.
    pub fn new(state: Value, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(state, scheduler, StoreConfig::default())
    }

    pub fn with_config(state: Value, scheduler: Arc<dyn Scheduler>, config: StoreConfig) -> Self {
        let core = Core {
            tree: state,
            listeners: ListenerRegistry::new(),
            computed: MetaNode::default(),
            batch: NotificationBatch::new(config.dedupe_notifications),
            generation: 0,
        };
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                scheduler,
                config,
            }),
        }
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Handle to the root of the tree.
    pub fn root(&self) -> PathHandle {
        PathHandle::new(self.clone(), Path::root())
    }

    /// Handle to `path`.
    pub fn at(&self, path: impl Into<Path>) -> PathHandle {
        PathHandle::new(self.clone(), path.into())
    }

    /// Read-only developer surface.
    pub fn debug(&self) -> DebugView {
        DebugView::new(self.clone())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.shared.scheduler
    }

    /// Whether a flush has been scheduled and not yet run.
    pub fn has_pending(&self) -> bool {
        self.shared.core.lock().batch.is_scheduled()
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// Current value at `path`. Missing intermediates read as `None`.
    pub(crate) fn read(&self, path: &Path) -> Option<Value> {
        tree::lookup(&self.shared.core.lock().tree, path).cloned()
    }

    pub(crate) fn keys(&self, path: &Path) -> Vec<String> {
        tree::keys_of(&self.shared.core.lock().tree, path)
    }

    /// Write `value` at `path`, creating intermediate maps.
    ///
    /// Returns whether anything changed; equal writes queue nothing.
    pub(crate) fn write(&self, path: &Path, value: Value) -> Result<bool> {
        let changed = {
            let mut core = self.shared.core.lock();
            let Core { tree: state, computed, .. } = &mut *core;
            let changed = tree::assign(state, path, value, self.shared.config.max_array_gap)?;
            if let Some(entry) = computed.get_mut(path) {
                entry.last_value = tree::lookup(state, path).cloned();
            }
            changed
        };
        if changed {
            self.notify(path);
        }
        Ok(changed)
    }

    /// Remove the value at `path`. Notifies whenever the parent exists.
    pub(crate) fn remove(&self, path: &Path) {
        let removed = tree::remove(&mut self.shared.core.lock().tree, path);
        if removed {
            self.notify(path);
        }
    }

    /// Apply `mutate` to the array at `path` in place and queue a single
    /// notification for the array itself.
    pub(crate) fn mutate_array<R>(
        &self,
        path: &Path,
        mutate: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R> {
        let result = {
            let mut core = self.shared.core.lock();
            match tree::lookup_mut(&mut core.tree, path) {
                Some(Value::Array(items)) => mutate(items),
                _ => return Err(StoreError::NotAnArray { path: path.key() }),
            }
        };
        self.notify(path);
        Ok(result)
    }

    /// Replace the array at `path` with `next`, but only while it still
    /// equals `expected`. Returns `Ok(false)` if it changed in the meantime.
    pub(crate) fn replace_array_if(
        &self,
        path: &Path,
        expected: &[Value],
        next: Vec<Value>,
    ) -> Result<bool> {
        {
            let mut core = self.shared.core.lock();
            match tree::lookup_mut(&mut core.tree, path) {
                Some(Value::Array(items)) if items.as_slice() == expected => *items = next,
                Some(Value::Array(_)) => return Ok(false),
                _ => return Err(StoreError::NotAnArray { path: path.key() }),
            }
        }
        self.notify(path);
        Ok(true)
    }

    pub(crate) fn subscribe(&self, path: &Path, listener: Listener) -> Subscription {
        let key = path.key();
        let id = self.shared.core.lock().listeners.insert(key.clone(), listener);
        let store = self.downgrade();
        let detach_key = key.clone();
        Subscription::new(id, key, move || {
            if let Some(store) = store.upgrade() {
                store.shared.core.lock().listeners.remove(&detach_key, id);
            }
        })
    }

    pub(crate) fn listener_count(&self, path: &Path) -> usize {
        self.shared.core.lock().listeners.count(&path.key())
    }

    // ------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------

    /// Queue notifications for `path` and its ancestors, scheduling a flush
    /// if none is pending.
    pub(crate) fn notify(&self, path: &Path) {
        let schedule = self.shared.core.lock().batch.queue(path);
        if self.shared.config.trace_notifications {
            debug!(path = %path, "queued notification");
        } else {
            trace!(path = %path, "queued notification");
        }

        if schedule {
            let store = self.downgrade();
            self.shared.scheduler.enqueue(Box::new(move || {
                if let Some(store) = store.upgrade() {
                    store.flush();
                }
            }));
        }
    }

    /// Deliver every notification queued so far.
    ///
    /// Normally run by the scheduler; hosts may call it to force delivery.
    pub fn flush(&self) {
        let entries = self.shared.core.lock().batch.take();

        for entry in entries {
            let (value, listeners) = {
                let core = self.shared.core.lock();
                if !core.listeners.has_listeners(&entry.queue_for) {
                    continue;
                }
                (
                    tree::lookup(&core.tree, &entry.update_path).cloned(),
                    core.listeners.snapshot(&entry.queue_for),
                )
            };

            if self.shared.config.trace_notifications {
                debug!(queue_for = %entry.queue_for, update_path = %entry.update_path, listeners = listeners.len(), "delivering");
            } else {
                trace!(queue_for = %entry.queue_for, update_path = %entry.update_path, listeners = listeners.len(), "delivering");
            }

            for listener in listeners {
                listener(value.as_ref(), &entry.update_path);
            }
        }
    }

    // ------------------------------------------------------------------
    // Computed properties
    // ------------------------------------------------------------------

    /// Install `compute` as the definition of `path`.
    ///
    /// Any previous definition at `path` is unsubscribed first. A failure
    /// of this first run is returned to the caller.
    pub(crate) fn define_computed<F, R>(&self, path: &Path, compute: F) -> Result<()>
    where
        F: Fn(&PathHandle) -> R + Send + Sync + 'static,
        R: IntoComputeResult,
    {
        let compute = erase(compute);
        let generation = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            let generation = core.generation;
            let Core { computed, listeners, .. } = &mut *core;
            if let Some(old) = computed.slot(path).take() {
                for (key, id) in old.subscriptions {
                    listeners.remove(&key, id);
                }
            }
            generation
        };

        let (outcome, dependencies) = self.run_compute(&compute);
        let derived = outcome.map_err(|source| StoreError::Compute {
            path: path.key(),
            source,
        })?;

        debug!(
            path = %path,
            dependencies = dependencies.len(),
            deferred = derived.is_deferred(),
            "defined computed property"
        );

        {
            let mut core = self.shared.core.lock();
            let Core { computed, listeners, .. } = &mut *core;
            let subscriptions = dependencies
                .iter()
                .map(|dep| {
                    let key = dep.key();
                    let id = listeners.insert(key.clone(), self.recompute_listener(path));
                    (key, id)
                })
                .collect();
            *computed.slot(path) = Some(ComputedEntry {
                compute,
                dependencies,
                is_async: derived.is_deferred(),
                generation,
                last_value: None,
                subscriptions,
            });
        }

        self.apply(path, derived, generation)
    }

    /// Run `compute` with a fresh tracker and return its outcome together
    /// with the paths it read before returning.
    fn run_compute(
        &self,
        compute: &ComputeFn,
    ) -> (std::result::Result<Derived, ComputeError>, IndexSet<Path>) {
        let tracker = Arc::new(Tracker::new());
        let root = PathHandle::tracked(self.clone(), Path::root(), tracker.clone());
        let outcome = compute(&root);
        (outcome, tracker.close())
    }

    fn recompute_listener(&self, path: &Path) -> Listener {
        let store = self.downgrade();
        let path = path.clone();
        Arc::new(move |_, _| {
            if let Some(store) = store.upgrade() {
                store.recompute(&path);
            }
        })
    }

    /// Re-run the definition at `path` after one of its dependencies
    /// changed. Failures are logged and the last good value is kept.
    pub(crate) fn recompute(&self, path: &Path) {
        let (compute, generation) = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            let generation = core.generation;
            let Some(entry) = core.computed.get_mut(path) else {
                return;
            };
            entry.generation = generation;
            (entry.compute.clone(), generation)
        };

        let (outcome, dependencies) = self.run_compute(&compute);
        let derived = match outcome {
            Ok(derived) => derived,
            Err(err) => {
                warn!(path = %path, error = %err, "recompute failed, keeping last value");
                return;
            }
        };

        self.rewire(path, dependencies, derived.is_deferred(), generation);
        if let Err(err) = self.apply(path, derived, generation) {
            warn!(path = %path, error = %err, "could not write recomputed value");
        }
    }

    /// Replace the recompute subscriptions of `path` with ones for
    /// `dependencies`. Unchanged dependency sets keep their listeners.
    fn rewire(&self, path: &Path, dependencies: IndexSet<Path>, is_async: bool, generation: u64) {
        let mut core = self.shared.core.lock();
        let Core { computed, listeners, .. } = &mut *core;
        let Some(entry) = computed.get_mut(path) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        entry.is_async = is_async;
        if entry.dependencies == dependencies {
            return;
        }

        debug!(
            path = %path,
            before = entry.dependencies.len(),
            after = dependencies.len(),
            "rebuilding dependencies"
        );
        for (key, id) in entry.subscriptions.drain(..) {
            listeners.remove(&key, id);
        }
        entry.subscriptions = dependencies
            .iter()
            .map(|dep| {
                let key = dep.key();
                let id = listeners.insert(key.clone(), self.recompute_listener(path));
                (key, id)
            })
            .collect();
        entry.dependencies = dependencies;
    }

    /// Write a compute result: immediately when ready, on resolution when
    /// deferred.
    fn apply(&self, path: &Path, derived: Derived, generation: u64) -> Result<()> {
        match derived {
            Derived::Ready(value) => self.write(path, value).map(|_| ()),
            Derived::Deferred(future) => {
                let store = self.downgrade();
                let path = path.clone();
                self.shared.scheduler.spawn(
                    future
                        .map(move |result| {
                            if let Some(store) = store.upgrade() {
                                store.resolve(&path, generation, result);
                            }
                        })
                        .boxed(),
                );
                Ok(())
            }
        }
    }

    /// Land a deferred result, unless a newer run has started since.
    fn resolve(
        &self,
        path: &Path,
        generation: u64,
        result: std::result::Result<Value, ComputeError>,
    ) {
        let current = self
            .shared
            .core
            .lock()
            .computed
            .get(path)
            .map(|entry| entry.generation);
        if current != Some(generation) {
            debug!(path = %path, generation, ?current, "dropping stale deferred result");
            return;
        }

        match result {
            Ok(value) => {
                if let Err(err) = self.write(path, value) {
                    warn!(path = %path, error = %err, "could not write deferred value");
                }
            }
            Err(err) => warn!(path = %path, error = %err, "deferred computation failed, keeping last value"),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub(crate) fn with_computed<R>(&self, inspect: impl FnOnce(&MetaNode) -> R) -> R {
        inspect(&self.shared.core.lock().computed)
    }

    pub(crate) fn snapshot(&self) -> Value {
        self.shared.core.lock().tree.clone()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("Store")
            .field("state", &core.tree)
            .field("pending", &core.batch.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Builder for [`Store`].
///
/// Defaults to an empty object as seed state and a [`ManualScheduler`].
#[derive(Default)]
pub struct StoreBuilder {
    state: Option<Value>,
    scheduler: Option<Arc<dyn Scheduler>>,
    config: StoreConfig,
}

impl StoreBuilder {
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Seed state from a MessagePack snapshot, as produced by
    /// [`DebugView::state_msgpack`].
    pub fn state_msgpack(mut self, bytes: &[u8]) -> Result<Self> {
        self.state = Some(rmp_serde::from_slice(bytes)?);
        Ok(self)
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Store {
        let state = self
            .state
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(ManualScheduler::new()));
        Store::with_config(state, scheduler, self.config)
    }
}
