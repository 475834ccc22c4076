//! Paths into the state tree.
//!
//! A [`Path`] is an ordered, immutable sequence of keys. Two paths are equal
//! when their canonical dot-joined forms are equal, so `["items", 1]` and
//! `["items", "1"]` address the same location and share listeners.

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

/// A single key within a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    /// An object property name.
    Name(String),
    /// An array position.
    Index(usize),
}

impl PathKey {
    /// The key as an array index, if it is one or parses as one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(i) => Some(*i),
            PathKey::Name(name) => name.parse().ok(),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Name(name) => f.write_str(name),
            PathKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Name(name.to_owned())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        PathKey::Name(name)
    }
}

impl From<&String> for PathKey {
    fn from(name: &String) -> Self {
        PathKey::Name(name.clone())
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// Location of a value in the state tree.
///
/// Paths are never mutated; [`Path::child`] returns a new path with one key
/// appended.
#[derive(Clone, Default)]
pub struct Path {
    keys: SmallVec<[PathKey; 4]>,
}

impl Path {
    /// The empty path, addressing the root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dot-separated path. The empty string is the root.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::root();
        }
        s.split('.').map(PathKey::from).collect()
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.into());
        Self { keys }
    }

    /// The path without its last key, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.keys.split_last()?;
        Some(Self {
            keys: init.iter().cloned().collect(),
        })
    }

    /// The last key, or `None` at the root.
    pub fn last(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_root(&self) -> bool {
        self.keys.is_empty()
    }

    /// The path made of the first `len` keys.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            keys: self.keys[..len.min(self.keys.len())].iter().cloned().collect(),
        }
    }

    /// Canonical key used for equality and listener lookup.
    pub fn key(&self) -> String {
        join_keys(&self.keys)
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.len() <= other.len() && self.key() == other.prefix(self.len()).key()
    }
}

/// Canonical dot-joined form of a key slice.
pub(crate) fn join_keys(keys: &[PathKey]) -> String {
    let mut out = String::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&key.to_string());
    }
    out
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys.iter().map(ToString::to_string)).finish()
    }
}

impl<K: Into<PathKey>> FromIterator<K> for Path {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<K: Into<PathKey>, const N: usize> From<[K; N]> for Path {
    fn from(keys: [K; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl<K: Into<PathKey>> From<Vec<K>> for Path {
    fn from(keys: Vec<K>) -> Self {
        keys.into_iter().collect()
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}
