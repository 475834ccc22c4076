//! Reactive State Tree
//!
//! This module implements the path-addressed reactive store: a JSON-shaped
//! state tree whose every location can be read, written and subscribed to
//! through a [`PathHandle`].
//!
//! # Concepts
//!
//! ## Paths and Handles
//!
//! A [`Path`] names a location; a [`PathHandle`] binds a path to a store.
//! Handles are cheap, ephemeral and never cache values.
//!
//! ## Batched Notification
//!
//! Writes update the tree immediately, but listeners run later, in one
//! flush per turn. A write to `user.profile.surname` reaches listeners on
//! that path, on `user.profile`, on `user` and on the root; each receives
//! the value at the changed path and the changed path itself.
//!
//! ## Computed Properties
//!
//! A compute function assigned to a path derives its value from other
//! paths. Dependencies are captured by running the function with a tracked
//! handle, and the function re-runs whenever any of them change. Functions
//! may return a deferred result that lands when its future resolves.
//!
//! # Implementation Notes
//!
//! Dependency capture is explicit: the tracking context travels inside the
//! handle given to the compute function instead of living in ambient
//! thread-local state, so nested and concurrent computations cannot see
//! each other's reads.

mod array;
mod batch;
mod computed;
mod context;
mod handle;
mod inspect;
mod listener;
mod path;
mod store;
mod tree;

pub use batch::{NotificationBatch, PendingNotification};
pub use computed::{ComputeFn, ComputedInfo, Derived, IntoComputeResult};
pub use context::Tracker;
pub use handle::PathHandle;
pub(crate) use handle::coerce;
pub use inspect::DebugView;
pub use listener::{Listener, ListenerId, ListenerRegistry, Subscription};
pub use path::{Path, PathKey};
pub use store::{Store, StoreBuilder};
