//! Path Handles
//!
//! A [`PathHandle`] is a small value carrying `(store, path)`. It is the
//! only way to read, write or subscribe to a location in the tree; nothing
//! outside the store ever holds a reference into the tree itself.
//!
//! Handles never cache values. Every read goes back to the store.
//!
//! A handle passed to a compute function also carries a [`Tracker`]; reads
//! made through it or any of its children record dependencies.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::computed::{ComputedInfo, IntoComputeResult};
use super::context::Tracker;
use super::inspect::DebugView;
use super::listener::Subscription;
use super::path::{Path, PathKey};
use super::store::Store;
use crate::error::Result;

/// Accessor bound to one location of a [`Store`].
#[derive(Clone)]
pub struct PathHandle {
    store: Store,
    path: Path,
    tracker: Option<Arc<Tracker>>,
}

impl PathHandle {
    pub(crate) fn new(store: Store, path: Path) -> Self {
        Self {
            store,
            path,
            tracker: None,
        }
    }

    pub(crate) fn tracked(store: Store, path: Path, tracker: Arc<Tracker>) -> Self {
        Self {
            store,
            path,
            tracker: Some(tracker),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Handle for `path + [key]`. Tracking carries over.
    pub fn child(&self, key: impl Into<PathKey>) -> PathHandle {
        Self {
            store: self.store.clone(),
            path: self.path.child(key),
            tracker: self.tracker.clone(),
        }
    }

    /// Handle for a descendant, e.g. `root.at("user.first")`.
    pub fn at(&self, relative: impl Into<Path>) -> PathHandle {
        let relative = relative.into();
        let mut path = self.path.clone();
        for key in relative.keys() {
            path = path.child(key.clone());
        }
        Self {
            store: self.store.clone(),
            path,
            tracker: self.tracker.clone(),
        }
    }

    /// Whether reads through this handle are being recorded.
    pub fn is_tracking(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| t.is_open())
    }

    fn track(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.track(&self.path);
        }
    }

    /// Current value. Missing paths read as `None`.
    pub fn get(&self) -> Option<Value> {
        self.track();
        self.store.read(&self.path)
    }

    /// Current value without recording a dependency.
    pub fn get_untracked(&self) -> Option<Value> {
        self.store.read(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.get().is_some()
    }

    /// Property names of an object, or indices of an array.
    pub fn keys(&self) -> Vec<String> {
        self.track();
        self.store.keys(&self.path)
    }

    /// Write `value`. Writing a value equal to the current one does
    /// nothing and notifies no one.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.store.write(&self.path, value.into()).map(|_| ())
    }

    /// Define this path as a computed property.
    ///
    /// `compute` runs at once with a tracked handle to the root; the paths
    /// it reads become its dependencies, and it runs again whenever any of
    /// them change. A failure of this first run is returned here.
    pub fn set_computed<F, R>(&self, compute: F) -> Result<()>
    where
        F: Fn(&PathHandle) -> R + Send + Sync + 'static,
        R: IntoComputeResult,
    {
        self.store.define_computed(&self.path, compute)
    }

    /// Remove the value. A no-op when the parent does not exist.
    pub fn delete(&self) {
        self.store.remove(&self.path);
    }

    /// Call `callback` with `(value at update path, update path)` whenever
    /// this path or any descendant changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Value>, &Path) + Send + Sync + 'static,
    {
        self.store.subscribe(&self.path, Arc::new(callback))
    }

    /// Computed metadata for this path, if it is a computed property.
    pub fn meta(&self) -> Option<ComputedInfo> {
        self.store
            .with_computed(|meta| meta.get(&self.path).map(|entry| entry.info(&self.path)))
    }

    pub fn debug(&self) -> DebugView {
        self.store.debug()
    }

    /// Number coercion. `None` when the value is missing or not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self.get()? {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Null => Some(0.0),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse().ok()
                }
            }
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// String coercion of a tree value: strings are written raw, arrays are
/// comma-joined with `null` elements left empty, objects print as
/// `[object Object]`.
pub(crate) fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => coerce(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_owned(),
        other => other.to_string(),
    }
}

/// Primitive coercion. Missing values print a placeholder naming the path
/// instead of failing.
impl fmt::Display for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.write_str(&coerce(&value)),
            None => write!(f, "Placeholder({})", self.path),
        }
    }
}

impl fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathHandle")
            .field("path", &self.path)
            .field("value", &self.get_untracked())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}
