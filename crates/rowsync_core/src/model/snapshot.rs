//! Immutable ordered identity snapshots.
//!
//! # Invariants
//! - Every key in a `Snapshot` is unique; construction rejects duplicates
//!   instead of silently dropping them.
//! - A snapshot is never edited after construction; a new one replaces it.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Contract violation: the same key appeared twice in one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdentity<K> {
    pub key: K,
    pub first_index: usize,
    pub second_index: usize,
}

impl<K: Display> Display for DuplicateIdentity<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "duplicate identity {} at positions {} and {}",
            self.key, self.first_index, self.second_index
        )
    }
}

impl<K: Debug + Display> Error for DuplicateIdentity<K> {}

/// Ordered, duplicate-free sequence of identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<K> {
    items: Vec<K>,
}

impl<K> Snapshot<K> {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[K] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<K> {
        self.items
    }
}

impl<K: Eq + Hash + Clone> Snapshot<K> {
    /// Builds a snapshot, failing on the first repeated key.
    pub fn new(items: Vec<K>) -> Result<Self, DuplicateIdentity<K>> {
        let mut seen: HashMap<&K, usize> = HashMap::with_capacity(items.len());
        for (index, key) in items.iter().enumerate() {
            if let Some(first_index) = seen.insert(key, index) {
                return Err(DuplicateIdentity {
                    key: key.clone(),
                    first_index,
                    second_index: index,
                });
            }
        }
        Ok(Self { items })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.contains(key)
    }

    pub fn position(&self, key: &K) -> Option<usize> {
        self.items.iter().position(|item| item == key)
    }
}

impl<K> Default for Snapshot<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, K> IntoIterator for &'a Snapshot<K> {
    type Item = &'a K;
    type IntoIter = std::slice::Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
