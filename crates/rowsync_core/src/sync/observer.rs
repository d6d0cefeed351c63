//! Change observer: turns store change batches into membership snapshots.
//!
//! # Invariants
//! - Batches are handed out in publication order, one at a time.
//! - Every observation re-fetches full membership; a batch is only a trigger.
//! - Fetch failures propagate; a partial snapshot is never produced.

use crate::model::identity::{RecordId, RecordKind};
use crate::model::snapshot::{DuplicateIdentity, Snapshot};
use crate::repo::record_store::{ChangeBatch, RecordStore, StoreError};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;

/// Membership could not be observed.
#[derive(Debug)]
pub enum FetchError {
    Store(StoreError),
    Duplicate(DuplicateIdentity<RecordId>),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "membership fetch failed: {err}"),
            Self::Duplicate(err) => write!(f, "membership fetch returned {err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Duplicate(err) => Some(err),
        }
    }
}

/// Subscription to one store context, tracking one record kind.
pub struct ChangeObserver {
    kind: RecordKind,
    changes: Receiver<ChangeBatch>,
}

impl ChangeObserver {
    /// Registers a new subscription on `store`.
    pub fn subscribe<S: RecordStore + ?Sized>(store: &mut S, kind: RecordKind) -> Self {
        Self {
            kind,
            changes: store.subscribe(),
        }
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    /// Next queued batch, if any. A dropped store yields `None`.
    pub fn next_batch(&self) -> Option<ChangeBatch> {
        self.changes.try_recv().ok()
    }

    /// Fetches the ordered identities of every live record of the tracked kind.
    pub fn observe<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<Snapshot<RecordId>, FetchError> {
        let ids = store.fetch_identities(&self.kind).map_err(|err| {
            error!(
                "event=membership_fetch module=sync status=error kind={} error={err}",
                self.kind
            );
            FetchError::Store(err)
        })?;
        Snapshot::new(ids).map_err(FetchError::Duplicate)
    }
}
