//! Arbor Core
//!
//! This crate provides the core runtime for the Arbor reactive state tree.
//! It implements:
//!
//! - A path-addressed state store with handles for every location
//! - Batched change notification that bubbles up to ancestors
//! - Computed properties with automatic dependency tracking
//! - Deferred (async) computed properties
//! - In-place array mutation with a single notification
//! - Introspection of computed metadata and state snapshots
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The store, path handles, listeners and computed properties
//! - `schedule`: Where flushes and deferred computations run
//! - `binding`: Glue between handles and host elements
//! - `config`: Store tuning knobs
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::reactive::{PathHandle, Store};
//! use arbor_core::schedule::ManualScheduler;
//! use serde_json::json;
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//! let store = Store::new(json!({ "user": { "first": "Bob", "last": "Smith" } }), scheduler.clone());
//!
//! // Derive a value from two other paths
//! store.at("user.full").set_computed(|s: &PathHandle| {
//!     json!(format!("{} {}", s.at("user.first"), s.at("user.last")))
//! })?;
//!
//! // Listen for changes
//! let sub = store.at("user").subscribe(|value, path| {
//!     println!("{path} changed to {value:?}");
//! });
//!
//! store.at("user.first").set("Jim")?;
//! scheduler.run_until_stalled();
//! // prints "user.first changed to ..." then "user.full changed to ..."
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod reactive;
pub mod schedule;

pub use binding::{BindTarget, Binding, TargetKind};
pub use config::StoreConfig;
pub use error::{ComputeError, Result, StoreError};
pub use reactive::{Derived, Path, PathHandle, PathKey, Store, StoreBuilder, Subscription};
pub use schedule::{ManualScheduler, Scheduler, TokioScheduler};
