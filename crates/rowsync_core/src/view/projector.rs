//! Presentation projector: owns the applied snapshot and its rendered rows.
//!
//! # Responsibility
//! - Diff each incoming snapshot against the applied one by identity.
//! - Keep exactly one `RenderedRow` per applied identity and hand the
//!   transition to a `PresentationSink`.
//!
//! # Invariants
//! - Rows are keyed by identity and never re-keyed; an identity change shows
//!   up as the old row leaving and a new row entering.
//! - Applying a snapshot cannot fail; uniqueness is guaranteed by `Snapshot`.

use crate::model::snapshot::Snapshot;
use crate::view::diff::{diff_snapshots, SnapshotDiff};
use log::debug;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Presentation state for one rendered identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow<K> {
    pub key: K,
    pub title: String,
    /// Bumped each time the row is explicitly reloaded.
    pub revision: u32,
}

impl<K: Display> RenderedRow<K> {
    fn render(key: K) -> Self {
        let title = key.to_string();
        Self {
            key,
            title,
            revision: 0,
        }
    }

    fn reloaded(&self) -> Self
    where
        K: Clone,
    {
        Self {
            key: self.key.clone(),
            title: self.key.to_string(),
            revision: self.revision + 1,
        }
    }
}

/// Receiver of applied transitions (a table view, a test recorder, ...).
pub trait PresentationSink<K> {
    fn apply_snapshot(&mut self, rows: &[RenderedRow<K>], diff: &SnapshotDiff<K>, animated: bool);
}

/// One transition as seen by a `RecordingSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTransition<K> {
    pub rows: Vec<RenderedRow<K>>,
    pub diff: SnapshotDiff<K>,
    pub animated: bool,
}

/// Headless sink that keeps every transition it was given.
#[derive(Debug, Clone)]
pub struct RecordingSink<K> {
    transitions: Vec<AppliedTransition<K>>,
}

impl<K> RecordingSink<K> {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    pub fn transitions(&self) -> &[AppliedTransition<K>] {
        &self.transitions
    }

    pub fn last(&self) -> Option<&AppliedTransition<K>> {
        self.transitions.last()
    }
}

impl<K> Default for RecordingSink<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> PresentationSink<K> for RecordingSink<K> {
    fn apply_snapshot(&mut self, rows: &[RenderedRow<K>], diff: &SnapshotDiff<K>, animated: bool) {
        self.transitions.push(AppliedTransition {
            rows: rows.to_vec(),
            diff: diff.clone(),
            animated,
        });
    }
}

/// Identity-keyed projector over a presentation sink.
pub struct Projector<K, S> {
    applied: Snapshot<K>,
    rows: Vec<RenderedRow<K>>,
    sink: S,
}

impl<K, S> Projector<K, S>
where
    K: Eq + Hash + Clone + Display,
    S: PresentationSink<K>,
{
    /// Starts with an empty applied snapshot and no rows.
    pub fn new(sink: S) -> Self {
        Self {
            applied: Snapshot::empty(),
            rows: Vec::new(),
            sink,
        }
    }

    pub fn applied(&self) -> &Snapshot<K> {
        &self.applied
    }

    pub fn rows(&self) -> &[RenderedRow<K>] {
        &self.rows
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Applies `snapshot` without reload marks.
    pub fn apply(&mut self, snapshot: Snapshot<K>, animated: bool) {
        self.apply_marked(snapshot, &[], animated);
    }

    /// Applies `snapshot`, re-rendering the surviving keys in `marked`.
    pub fn apply_marked(&mut self, snapshot: Snapshot<K>, marked: &[K], animated: bool) {
        let diff = diff_snapshots(&self.applied, &snapshot, marked);

        let mut previous: HashMap<K, RenderedRow<K>> = self
            .rows
            .drain(..)
            .map(|row| (row.key.clone(), row))
            .collect();
        let rows: Vec<RenderedRow<K>> = snapshot
            .iter()
            .map(|key| match previous.remove(key) {
                Some(row) if diff.reloads.contains(key) => row.reloaded(),
                Some(row) => row,
                None => RenderedRow::render(key.clone()),
            })
            .collect();

        debug!(
            "event=snapshot_apply module=view status=ok rows={} removed={} inserted={} moved={} reloaded={} animated={animated}",
            rows.len(),
            diff.removals.len(),
            diff.insertions.len(),
            diff.moves.len(),
            diff.reloads.len()
        );

        self.sink.apply_snapshot(&rows, &diff, animated);
        self.rows = rows;
        self.applied = snapshot;
    }
}
