//! Identity-keyed ordered-set diff.
//!
//! # Invariants
//! - Keys are matched by equality only, never by position.
//! - A key present in both snapshots is either untouched or a move, never a
//!   removal + insertion pair.
//! - Moves are the complement of one longest increasing subsequence of old
//!   positions, so removing a key does not turn its shifted neighbours into
//!   moves.

use crate::model::snapshot::Snapshot;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Key removed from the old snapshot; `index` is its old position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal<K> {
    pub index: usize,
    pub key: K,
}

/// Key added by the new snapshot; `index` is its new position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion<K> {
    pub index: usize,
    pub key: K,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move<K> {
    pub key: K,
    pub from: usize,
    pub to: usize,
}

/// Transition between two applied snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDiff<K> {
    pub removals: Vec<Removal<K>>,
    pub insertions: Vec<Insertion<K>>,
    pub moves: Vec<Move<K>>,
    /// Surviving keys explicitly marked for re-render.
    pub reloads: Vec<K>,
}

impl<K> SnapshotDiff<K> {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
            && self.insertions.is_empty()
            && self.moves.is_empty()
            && self.reloads.is_empty()
    }
}

impl<K> Default for SnapshotDiff<K> {
    fn default() -> Self {
        Self {
            removals: Vec::new(),
            insertions: Vec::new(),
            moves: Vec::new(),
            reloads: Vec::new(),
        }
    }
}

/// Computes the transition from `old` to `new`.
///
/// `marked` keys that survive the transition are reported as reloads, in new
/// snapshot order; marks on inserted or removed keys are ignored.
pub fn diff_snapshots<K: Eq + Hash + Clone>(
    old: &Snapshot<K>,
    new: &Snapshot<K>,
    marked: &[K],
) -> SnapshotDiff<K> {
    let old_positions: HashMap<&K, usize> =
        old.iter().enumerate().map(|(index, key)| (key, index)).collect();
    let new_keys: HashSet<&K> = new.iter().collect();

    let removals = old
        .iter()
        .enumerate()
        .filter(|(_, key)| !new_keys.contains(key))
        .map(|(index, key)| Removal {
            index,
            key: key.clone(),
        })
        .collect();

    let mut insertions = Vec::new();
    // (new index, old index) for keys present in both, in new order.
    let mut survivors = Vec::new();
    for (index, key) in new.iter().enumerate() {
        match old_positions.get(key) {
            Some(&old_index) => survivors.push((index, old_index)),
            None => insertions.push(Insertion {
                index,
                key: key.clone(),
            }),
        }
    }

    let old_order: Vec<usize> = survivors.iter().map(|(_, old_index)| *old_index).collect();
    let stable = longest_increasing_subsequence(&old_order);
    let moves = survivors
        .iter()
        .enumerate()
        .filter(|(position, _)| !stable.contains(position))
        .map(|(_, &(to, from))| Move {
            key: new.as_slice()[to].clone(),
            from,
            to,
        })
        .collect();

    let marked: HashSet<&K> = marked.iter().collect();
    let reloads = survivors
        .iter()
        .map(|&(to, _)| &new.as_slice()[to])
        .filter(|key| marked.contains(key))
        .cloned()
        .collect();

    SnapshotDiff {
        removals,
        insertions,
        moves,
        reloads,
    }
}

/// Positions (into `values`) of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(values: &[usize]) -> HashSet<usize> {
    // tails[len] = position of the smallest tail of an increasing run of
    // length len + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];

    for (position, value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < *value);
        if slot > 0 {
            predecessors[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut stable = HashSet::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        stable.insert(position);
        cursor = predecessors[position];
    }
    stable
}
