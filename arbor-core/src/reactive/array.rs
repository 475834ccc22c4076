//! Array mutation methods.
//!
//! In-place array operations on a [`PathHandle`]. Each one mutates the
//! stored array directly and queues exactly one notification, for the array
//! path itself, no matter how many indices moved. Listeners receive the
//! whole new array as the value.
//!
//! Values passed in are collected before the store is locked, so the
//! iterators may read the store.
//!
//! Index assignment (`handle.child(i).set(v)`) is not intercepted: it goes
//! through the ordinary write path and notifies at the index path, which
//! bubbles up to the array.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use super::handle::PathHandle;
use crate::error::{Result, StoreError};

/// Sort attempts before giving up on an array that keeps changing.
const SORT_ATTEMPTS: usize = 4;

impl PathHandle {
    /// Append values. Returns the new length.
    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().collect();
        self.store().mutate_array(self.path(), |items| {
            items.extend(values);
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.store().mutate_array(self.path(), Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.store().mutate_array(self.path(), |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Insert values at the front, keeping their order. Returns the new
    /// length.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().collect();
        self.store().mutate_array(self.path(), |items| {
            items.splice(0..0, values);
            items.len()
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `insert` in their place. Returns the removed elements.
    ///
    /// A negative `start` counts from the end. Both bounds are clamped to
    /// the array.
    pub fn splice(
        &self,
        start: isize,
        delete_count: usize,
        insert: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let insert: Vec<Value> = insert.into_iter().collect();
        self.store().mutate_array(self.path(), |items| {
            let len = items.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                start.unsigned_abs().min(len)
            };
            let end = start + delete_count.min(len - start);
            items.splice(start..end, insert).collect()
        })
    }

    /// Sort in place with `compare`.
    ///
    /// The comparator runs without the store locked, so it may read or
    /// write the store. A copy is sorted and swapped in only if the array
    /// is unchanged; if it changed meanwhile the sort starts over on the
    /// new contents, and fails with [`StoreError::SortConflict`] if it
    /// keeps changing.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        for attempt in 1..=SORT_ATTEMPTS {
            let snapshot = match self.get_untracked() {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(StoreError::NotAnArray {
                        path: self.path().key(),
                    })
                }
            };
            let mut sorted = snapshot.clone();
            sorted.sort_by(|a, b| compare(a, b));
            if self.store().replace_array_if(self.path(), &snapshot, sorted)? {
                return Ok(());
            }
            debug!(path = %self.path(), attempt, "array changed during sort, retrying");
        }
        Err(StoreError::SortConflict {
            path: self.path().key(),
        })
    }

    /// Reverse in place.
    pub fn reverse(&self) -> Result<()> {
        self.store().mutate_array(self.path(), |items| items.reverse())
    }

    /// Length of the array, or `None` if the value is not an array.
    pub fn array_len(&self) -> Option<usize> {
        match self.get()? {
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }
}
