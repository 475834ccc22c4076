//! Introspection
//!
//! Read-only developer surface: the tree of computed properties with their
//! dependencies, and snapshots of the raw state. Nothing here feeds back
//! into binding logic.

use serde_json::Value;
use tracing::info;

use super::computed::ComputedInfo;
use super::path::Path;
use super::store::Store;
use crate::error::Result;

/// Debug accessor for a [`Store`].
#[derive(Debug, Clone)]
pub struct DebugView {
    store: Store,
}

impl DebugView {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Pretty-printed tree of computed paths.
    ///
    /// ```text
    /// Computed Properties Tree:
    /// user:
    ///   - full
    ///     ↳ deps: [user.first, user.last]
    ///     ↳ async: false
    ///     ↳ lastValue: "Bob Smith"
    /// ```
    pub fn computed_tree(&self) -> String {
        let mut out = String::from("Computed Properties Tree:\n");
        self.store.with_computed(|meta| meta.render("", &mut out));
        out
    }

    /// Emit [`DebugView::computed_tree`] through `tracing`.
    pub fn print_computed_tree(&self) {
        info!("{}", self.computed_tree());
    }

    /// Every computed property, depth first in definition order.
    pub fn inspect_computed(&self) -> Vec<ComputedInfo> {
        self.store.with_computed(|meta| {
            let mut found = Vec::new();
            meta.walk(&Path::root(), &mut |path, entry| found.push(entry.info(path)));
            found
        })
    }

    /// Metadata for the computed property at `path`.
    pub fn computed_at(&self, path: impl Into<Path>) -> Option<ComputedInfo> {
        self.store.at(path).meta()
    }

    /// Copy of the current state.
    pub fn state(&self) -> Value {
        self.store.snapshot()
    }

    /// Current state as MessagePack.
    pub fn state_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(&self.store.snapshot())?)
    }

    /// Emit the current state through `tracing`.
    pub fn print_state(&self) {
        info!(state = %self.store.snapshot(), "store state");
    }
}
