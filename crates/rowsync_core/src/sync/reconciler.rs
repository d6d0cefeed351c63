//! Identity reconciler: rewrites observed snapshots to permanent identities.
//!
//! # Responsibility
//! - Find temporary identities in an observed snapshot.
//! - Promote their records in one batch through the same store context.
//! - Rewrite the snapshot, original order kept, with the promoted identities.
//!
//! # Invariants
//! - Output has the input's length and order and contains no temporaries.
//! - Snapshots without temporaries are returned as-is and the store is not
//!   touched.
//! - Any failure abandons the whole rewrite.

use crate::model::identity::{RecordHandle, RecordId};
use crate::model::snapshot::{DuplicateIdentity, Snapshot};
use crate::repo::record_store::{RecordStore, StoreError};
use log::{error, info};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Reconciliation attempt failed; nothing may be applied.
#[derive(Debug)]
pub enum ReconcileError {
    /// A temporary identity no longer resolves in this context.
    Resolve { id: RecordId, source: StoreError },
    /// The store refused the promotion batch.
    Promotion(StoreError),
    /// Promotion reported success but left a temporary identity behind.
    StillTemporary(RecordId),
    /// Two records ended up with the same identity after rewriting.
    Duplicate(DuplicateIdentity<RecordId>),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolve { id, source } => write!(f, "cannot resolve {id}: {source}"),
            Self::Promotion(err) => write!(f, "permanent identity promotion failed: {err}"),
            Self::StillTemporary(id) => write!(f, "identity still temporary after promotion: {id}"),
            Self::Duplicate(err) => write!(f, "reconciled snapshot has {err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolve { source, .. } => Some(source),
            Self::Promotion(err) => Some(err),
            Self::StillTemporary(_) => None,
            Self::Duplicate(err) => Some(err),
        }
    }
}

/// Returns `observed` with every temporary identity replaced by the
/// permanent identity of the same record.
///
/// # Side effects
/// - Promotes the records behind temporary identities (irreversible).
pub fn reconcile<S: RecordStore + ?Sized>(
    store: &mut S,
    observed: &Snapshot<RecordId>,
) -> Result<Snapshot<RecordId>, ReconcileError> {
    let temporaries: Vec<RecordId> = observed
        .iter()
        .filter(|id| id.is_temporary())
        .copied()
        .collect();
    if temporaries.is_empty() {
        return Ok(observed.clone());
    }

    let started_at = Instant::now();
    let mut records: HashMap<RecordId, RecordHandle> = HashMap::with_capacity(temporaries.len());
    for id in &temporaries {
        let handle = store.resolve(*id).map_err(|source| {
            error!(
                "event=reconcile module=sync status=error stage=resolve id={id} error={source}"
            );
            ReconcileError::Resolve { id: *id, source }
        })?;
        records.insert(*id, handle);
    }

    let batch: BTreeSet<RecordHandle> = records.values().copied().collect();
    store.promote(&batch).map_err(|err| {
        error!(
            "event=reconcile module=sync status=error stage=promote batch_size={} error={err}",
            batch.len()
        );
        ReconcileError::Promotion(err)
    })?;

    let mut rewritten = Vec::with_capacity(observed.len());
    for id in observed {
        let current = match records.get(id) {
            Some(handle) => store
                .identity_of(*handle)
                .map_err(|source| ReconcileError::Resolve { id: *id, source })?,
            None => *id,
        };
        if current.is_temporary() {
            return Err(ReconcileError::StillTemporary(current));
        }
        rewritten.push(current);
    }
    let reconciled = Snapshot::new(rewritten).map_err(ReconcileError::Duplicate)?;

    info!(
        "event=reconcile module=sync status=ok items={} promoted={} duration_ms={}",
        reconciled.len(),
        batch.len(),
        started_at.elapsed().as_millis()
    );
    Ok(reconciled)
}
