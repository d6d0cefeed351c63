//! Reconcile pipeline driver: observe -> reconcile -> apply.
//!
//! # Responsibility
//! - Drain change batches in arrival order and run one reconciliation pass
//!   per batch against the caller's store context.
//! - Apply only fully reconciled snapshots to the projector.
//!
//! # Invariants
//! - A failed pass leaves the applied snapshot untouched; the failing batch
//!   is discarded, later batches stay queued.
//! - All store access of one pass goes through the same `&mut S`.

use crate::model::identity::{RecordId, RecordKind};
use crate::repo::record_store::{ChangeBatch, RecordStore};
use crate::sync::observer::{ChangeObserver, FetchError};
use crate::sync::reconciler::{reconcile, ReconcileError};
use crate::view::projector::{PresentationSink, Projector};
use log::{debug, error};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum PipelineError {
    Fetch(FetchError),
    Reconcile(ReconcileError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Reconcile(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Reconcile(err) => Some(err),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

impl From<ReconcileError> for PipelineError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

/// Observation pipeline bound to one store context and one presentation.
pub struct ReconcilePipeline<P> {
    observer: ChangeObserver,
    projector: Projector<RecordId, P>,
    animate: bool,
}

impl<P: PresentationSink<RecordId>> ReconcilePipeline<P> {
    /// Subscribes to `store` for `kind`. Nothing is applied until `start` or
    /// `pump`.
    pub fn new<S: RecordStore + ?Sized>(
        store: &mut S,
        kind: RecordKind,
        sink: P,
        animate: bool,
    ) -> Self {
        Self {
            observer: ChangeObserver::subscribe(store, kind),
            projector: Projector::new(sink),
            animate,
        }
    }

    pub fn projector(&self) -> &Projector<RecordId, P> {
        &self.projector
    }

    /// Initial fetch, applied without animation.
    pub fn start<S: RecordStore + ?Sized>(&mut self, store: &mut S) -> Result<(), PipelineError> {
        self.run_pass(store, &[], false)
    }

    /// Processes every queued batch in order; returns how many were applied.
    ///
    /// Stops at the first failure, leaving the remaining batches queued.
    pub fn pump<S: RecordStore + ?Sized>(&mut self, store: &mut S) -> Result<usize, PipelineError> {
        let mut applied = 0;
        while let Some(batch) = self.observer.next_batch() {
            self.process(store, &batch)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Runs one pass for `batch`, marking its updated identities for reload.
    pub fn process<S: RecordStore + ?Sized>(
        &mut self,
        store: &mut S,
        batch: &ChangeBatch,
    ) -> Result<(), PipelineError> {
        debug!(
            "event=batch_process module=sync status=start kind={} inserted={} deleted={} updated={}",
            self.observer.kind(),
            batch.inserted.len(),
            batch.deleted.len(),
            batch.updated.len()
        );
        self.run_pass(store, &batch.updated, self.animate)
    }

    fn run_pass<S: RecordStore + ?Sized>(
        &mut self,
        store: &mut S,
        marked: &[RecordId],
        animated: bool,
    ) -> Result<(), PipelineError> {
        let outcome = match self.observer.observe(store) {
            Ok(observed) => reconcile(store, &observed).map_err(PipelineError::from),
            Err(err) => Err(PipelineError::from(err)),
        };

        match outcome {
            Ok(reconciled) => {
                self.projector.apply_marked(reconciled, marked, animated);
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=batch_process module=sync status=error kind={} applied_rows={} error={err}",
                    self.observer.kind(),
                    self.projector.rows().len()
                );
                Err(err)
            }
        }
    }
}
