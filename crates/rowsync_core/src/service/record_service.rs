//! Record list use-case service.
//!
//! # Responsibility
//! - Provide the user-facing mutations of the record list (add, delete).
//! - Own the store context and the reconcile pipeline observing it.
//! - Report save failures without corrupting store or presentation state.
//!
//! # Invariants
//! - Every mutation goes through the single owned store context.
//! - A failed save rolls the context back; the applied snapshot only changes
//!   on the next successfully observed change.

use crate::config::{ConfigError, ReconcileConfig};
use crate::model::identity::{RecordHandle, RecordId, RecordKind};
use crate::repo::record_store::{RecordStore, StoreError};
use crate::sync::pipeline::{PipelineError, ReconcilePipeline};
use crate::view::projector::{PresentationSink, RenderedRow};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// User mutation whose save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOperation {
    Insert,
    Delete,
}

impl Display for SaveOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Recoverable failure to persist a user mutation.
#[derive(Debug)]
pub struct SaveError {
    pub operation: SaveOperation,
    pub source: StoreError,
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not save {}: {}", self.operation, self.source)
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    Store(StoreError),
    Pipeline(PipelineError),
    Save(SaveError),
}

impl ServiceError {
    /// Whether the caller may keep using the service after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Save(_))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Pipeline(err) => write!(f, "{err}"),
            Self::Save(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Pipeline(err) => Some(err),
            Self::Save(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<PipelineError> for ServiceError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl From<SaveError> for ServiceError {
    fn from(value: SaveError) -> Self {
        Self::Save(value)
    }
}

/// Record list service over one store context.
pub struct RecordService<S: RecordStore, P> {
    store: S,
    pipeline: ReconcilePipeline<P>,
    kind: RecordKind,
    eager_promotion: bool,
}

impl<S: RecordStore, P: PresentationSink<RecordId>> RecordService<S, P> {
    /// Wires the pipeline to `store` and applies the initial fetch.
    pub fn new(mut store: S, sink: P, config: &ReconcileConfig) -> Result<Self, ServiceError> {
        let kind = config.record_kind()?;
        let mut pipeline =
            ReconcilePipeline::new(&mut store, kind.clone(), sink, config.animate_differences);
        pipeline.start(&mut store)?;

        info!(
            "event=service_start module=service status=ok kind={kind} eager_promotion={} rows={}",
            config.eager_promotion_on_insert,
            pipeline.projector().rows().len()
        );
        Ok(Self {
            store,
            pipeline,
            kind,
            eager_promotion: config.eager_promotion_on_insert,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn pipeline(&self) -> &ReconcilePipeline<P> {
        &self.pipeline
    }

    pub fn rows(&self) -> &[RenderedRow<RecordId>] {
        self.pipeline.projector().rows()
    }

    /// Inserts one record, lets the pipeline observe it, then saves.
    ///
    /// # Contract
    /// - With eager promotion the record is promoted before anyone observes
    ///   it; otherwise the pipeline promotes it while reconciling.
    /// - Returns the permanent identity of the saved record.
    pub fn add_record(&mut self) -> Result<RecordId, ServiceError> {
        let handle = self.store.insert(&self.kind)?;

        if self.eager_promotion {
            let batch = BTreeSet::from([handle]);
            if let Err(err) = self.store.promote(&batch) {
                warn!(
                    "event=record_add module=service status=error stage=eager_promote error={err}"
                );
                self.store.delete(handle)?;
                return Err(err.into());
            }
        }

        self.store.process_pending_changes();
        self.pipeline.pump(&mut self.store)?;
        self.save(SaveOperation::Insert)?;
        self.pipeline.pump(&mut self.store)?;

        let id = self.store.identity_of(handle)?;
        info!("event=record_add module=service status=ok id={id}");
        Ok(id)
    }

    /// Deletes the record rendered as `id` and saves.
    pub fn delete_record(&mut self, id: RecordId) -> Result<(), ServiceError> {
        let handle: RecordHandle = self.store.resolve(id)?;
        self.store.delete(handle)?;
        self.save(SaveOperation::Delete)?;
        self.pipeline.pump(&mut self.store)?;

        info!("event=record_delete module=service status=ok id={id}");
        Ok(())
    }

    /// Processes changes published by other writers of this context.
    pub fn pump(&mut self) -> Result<usize, ServiceError> {
        Ok(self.pipeline.pump(&mut self.store)?)
    }

    fn save(&mut self, operation: SaveOperation) -> Result<(), SaveError> {
        self.store.commit().map_err(|source| {
            error!(
                "event=record_save module=service status=error operation={operation} error={source}"
            );
            self.store.rollback();
            SaveError { operation, source }
        })
    }
}
