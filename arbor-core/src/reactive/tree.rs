//! State tree walking.
//!
//! The tree is a `serde_json::Value`. Reads never create structure; writes
//! create intermediate maps (never arrays) on demand.

use serde_json::{Map, Value};

use super::path::{join_keys, Path, PathKey};
use crate::error::{Result, StoreError};

/// Read the value at `path`, short-circuiting to `None` on any missing
/// intermediate.
pub(crate) fn lookup<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.keys().iter().try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(&key.to_string()),
        Value::Array(items) => key.as_index().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable counterpart of [`lookup`].
pub(crate) fn lookup_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    lookup_keys_mut(root, path.keys())
}

fn lookup_keys_mut<'a>(root: &'a mut Value, keys: &[PathKey]) -> Option<&'a mut Value> {
    keys.iter().try_fold(root, |node, key| match node {
        Value::Object(map) => map.get_mut(&key.to_string()),
        Value::Array(items) => key.as_index().and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Write `value` at `path`.
///
/// Returns `Ok(false)` when the existing value is equal and nothing was
/// written. An array index more than `max_gap` past the end is rejected
/// rather than padded.
pub(crate) fn assign(root: &mut Value, path: &Path, value: Value, max_gap: usize) -> Result<bool> {
    let keys = path.keys();
    let Some((last, parents)) = keys.split_last() else {
        if *root == value {
            return Ok(false);
        }
        *root = value;
        return Ok(true);
    };

    let mut node = root;
    for (depth, key) in parents.iter().enumerate() {
        node = descend_or_create(node, key, &keys[..depth], max_gap)?;
    }
    write_slot(node, last, value, parents, max_gap)
}

fn descend_or_create<'a>(
    node: &'a mut Value,
    key: &PathKey,
    at: &[PathKey],
    max_gap: usize,
) -> Result<&'a mut Value> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => Ok(map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = padded_index(items, key, at, max_gap)?;
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(Value::Object(Map::new()));
            }
            Ok(&mut items[index])
        }
        _ => Err(StoreError::NotAContainer {
            path: join_keys(at),
        }),
    }
}

fn write_slot(
    node: &mut Value,
    key: &PathKey,
    value: Value,
    at: &[PathKey],
    max_gap: usize,
) -> Result<bool> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            let name = key.to_string();
            if map.get(&name) == Some(&value) {
                return Ok(false);
            }
            map.insert(name, value);
            Ok(true)
        }
        Value::Array(items) => {
            let index = padded_index(items, key, at, max_gap)?;
            match items.get_mut(index) {
                Some(slot) if *slot == value => return Ok(false),
                Some(slot) => *slot = value,
                None => {
                    items.resize(index, Value::Null);
                    items.push(value);
                }
            }
            Ok(true)
        }
        _ => Err(StoreError::NotAContainer {
            path: join_keys(at),
        }),
    }
}

fn array_index(key: &PathKey, at: &[PathKey]) -> Result<usize> {
    key.as_index().ok_or_else(|| StoreError::InvalidIndex {
        path: join_keys(at),
        key: key.to_string(),
    })
}

/// Index for a write into `items`, at most `max_gap` slots past the end.
fn padded_index(items: &[Value], key: &PathKey, at: &[PathKey], max_gap: usize) -> Result<usize> {
    let index = array_index(key, at)?;
    if index > items.len().saturating_add(max_gap) {
        return Err(StoreError::InvalidIndex {
            path: join_keys(at),
            key: key.to_string(),
        });
    }
    Ok(index)
}

/// Remove the value at `path`.
///
/// Returns `false` when the parent is absent (or the path is the root), in
/// which case nothing happened and no notification is due. Array elements
/// are replaced by `null` so the length is preserved.
pub(crate) fn remove(root: &mut Value, path: &Path) -> bool {
    let Some((last, parents)) = path.keys().split_last() else {
        return false;
    };
    match lookup_keys_mut(root, parents) {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => {
            map.shift_remove(&last.to_string());
            true
        }
        Some(Value::Array(items)) => {
            if let Some(slot) = last.as_index().and_then(|i| items.get_mut(i)) {
                *slot = Value::Null;
            }
            true
        }
        Some(_) => true,
    }
}

/// Own keys of the value at `path`: property names, or indices for arrays.
pub(crate) fn keys_of(root: &Value, path: &Path) -> Vec<String> {
    match lookup(root, path) {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}
