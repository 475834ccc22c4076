//! Store configuration.

use serde::Deserialize;

/// Default for [`StoreConfig::max_array_gap`].
pub const DEFAULT_MAX_ARRAY_GAP: usize = 4096;

/// Tunables for a [`Store`](crate::reactive::Store).
///
/// Deserializable so hosts can load it alongside their own settings; every
/// field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Collapse identical `(queue path, update path)` entries queued within
    /// one turn. Distinct update paths are never merged. Off by default:
    /// every write queues its own entries.
    pub dedupe_notifications: bool,

    /// How far past the end of an array a write may land. The gap is
    /// padded with `null`; writes beyond it fail with `InvalidIndex`.
    pub max_array_gap: usize,

    /// Log queued and delivered notifications at `debug` instead of `trace`.
    pub trace_notifications: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dedupe_notifications: false,
            max_array_gap: DEFAULT_MAX_ARRAY_GAP,
            trace_notifications: false,
        }
    }
}
