//! Computed Properties
//!
//! A computed property is a path whose value is produced by a compute
//! function. The function receives a tracked handle to the root of the
//! tree; the paths it reads during its synchronous execution become its
//! dependency set.
//!
//! # Lifecycle
//!
//! 1. **Defining**: a function is assigned to a path. A fresh tracker is
//!    opened and the function runs once.
//!
//! 2. **Computing**: the tracker closes when the function returns. A ready
//!    result is written at once; a deferred result is written when its
//!    future resolves.
//!
//! 3. **Subscribed**: metadata is stored and a recompute listener is
//!    registered at every dependency path.
//!
//! 4. **Recomputing**: a dependency changed. The function runs again
//!    against the live store, the dependency set is rebuilt from scratch and
//!    the recompute listeners are swapped for the new set.
//!
//! # Generations
//!
//! Every run bumps the path's generation. A deferred result carries the
//! generation that produced it and is dropped if a newer run has started in
//! the meantime, so a slow resolution never overwrites a newer value.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

use super::handle::PathHandle;
use super::listener::ListenerId;
use super::path::{Path, PathKey};
use crate::error::ComputeError;

/// Output of one compute run.
pub enum Derived {
    /// The value is available now.
    Ready(Value),
    /// The value arrives when the future resolves.
    Deferred(BoxFuture<'static, Result<Value, ComputeError>>),
}

impl Derived {
    pub fn ready(value: impl Into<Value>) -> Self {
        Derived::Ready(value.into())
    }

    /// A deferred result from an infallible future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Derived::Deferred(future.map(Ok).boxed())
    }

    /// A deferred result from a fallible future.
    pub fn try_deferred<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<Value, E>> + Send + 'static,
        E: fmt::Display,
    {
        Derived::Deferred(
            future
                .map(|result| result.map_err(|e| ComputeError::new(e.to_string())))
                .boxed(),
        )
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Derived::Deferred(_))
    }
}

impl fmt::Debug for Derived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derived::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Derived::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<Value> for Derived {
    fn from(value: Value) -> Self {
        Derived::Ready(value)
    }
}

/// Anything a compute function may return.
pub trait IntoComputeResult {
    fn into_compute_result(self) -> Result<Derived, ComputeError>;
}

impl IntoComputeResult for Value {
    fn into_compute_result(self) -> Result<Derived, ComputeError> {
        Ok(Derived::Ready(self))
    }
}

impl IntoComputeResult for Derived {
    fn into_compute_result(self) -> Result<Derived, ComputeError> {
        Ok(self)
    }
}

impl<T, E> IntoComputeResult for Result<T, E>
where
    T: Into<Derived>,
    E: fmt::Display,
{
    fn into_compute_result(self) -> Result<Derived, ComputeError> {
        self.map(Into::into)
            .map_err(|e| ComputeError::new(e.to_string()))
    }
}

/// Type-erased compute function.
pub type ComputeFn = Arc<dyn Fn(&PathHandle) -> Result<Derived, ComputeError> + Send + Sync>;

pub(crate) fn erase<F, R>(compute: F) -> ComputeFn
where
    F: Fn(&PathHandle) -> R + Send + Sync + 'static,
    R: IntoComputeResult,
{
    Arc::new(move |root| compute(root).into_compute_result())
}

/// Metadata for one computed path.
pub(crate) struct ComputedEntry {
    pub compute: ComputeFn,
    pub dependencies: IndexSet<Path>,
    pub is_async: bool,
    pub generation: u64,
    pub last_value: Option<Value>,
    /// Recompute listeners currently registered, by dependency key.
    pub subscriptions: Vec<(String, ListenerId)>,
}

/// Read-only view of a computed property's metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedInfo {
    pub path: String,
    pub dependencies: Vec<String>,
    pub is_async: bool,
    pub generation: u64,
    pub last_value: Option<Value>,
}

impl ComputedEntry {
    pub fn info(&self, path: &Path) -> ComputedInfo {
        ComputedInfo {
            path: path.key(),
            dependencies: self.dependencies.iter().map(Path::key).collect(),
            is_async: self.is_async,
            generation: self.generation,
            last_value: self.last_value.clone(),
        }
    }
}

/// Metadata tree mirroring the shape of the state tree.
///
/// Kept apart from the values so introspection can walk it without
/// touching state.
#[derive(Default)]
pub(crate) struct MetaNode {
    pub entry: Option<ComputedEntry>,
    pub children: IndexMap<String, MetaNode>,
}

impl MetaNode {
    pub fn get(&self, path: &Path) -> Option<&ComputedEntry> {
        self.node(path.keys())?.entry.as_ref()
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut ComputedEntry> {
        let mut node = self;
        for key in path.keys() {
            node = node.children.get_mut(&key.to_string())?;
        }
        node.entry.as_mut()
    }

    fn node(&self, keys: &[PathKey]) -> Option<&MetaNode> {
        keys.iter()
            .try_fold(self, |node, key| node.children.get(&key.to_string()))
    }

    /// Slot for `path`, creating intermediate nodes.
    pub fn slot(&mut self, path: &Path) -> &mut Option<ComputedEntry> {
        let mut node = self;
        for key in path.keys() {
            node = node.children.entry(key.to_string()).or_default();
        }
        &mut node.entry
    }

    /// Depth-first walk over every entry, in definition order.
    pub fn walk<'a>(&'a self, at: &Path, visit: &mut dyn FnMut(&Path, &'a ComputedEntry)) {
        if let Some(entry) = &self.entry {
            visit(at, entry);
        }
        for (key, child) in &self.children {
            child.walk(&at.child(key.as_str()), visit);
        }
    }

    /// Indented tree of computed paths and their dependencies.
    pub fn render(&self, indent: &str, out: &mut String) {
        for (key, child) in &self.children {
            if let Some(entry) = &child.entry {
                let deps: Vec<String> = entry.dependencies.iter().map(Path::key).collect();
                out.push_str(&format!("{indent}- {key}\n"));
                out.push_str(&format!("{indent}  ↳ deps: [{}]\n", deps.join(", ")));
                out.push_str(&format!("{indent}  ↳ async: {}\n", entry.is_async));
                if let Some(value) = &entry.last_value {
                    out.push_str(&format!("{indent}  ↳ lastValue: {value}\n"));
                }
            }
            if !child.children.is_empty() {
                out.push_str(&format!("{indent}{key}:\n"));
                child.render(&format!("{indent}  "), out);
            }
        }
    }
}
