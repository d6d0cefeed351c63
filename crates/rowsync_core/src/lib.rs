//! Identity reconciliation core for record lists.
//!
//! Records get a temporary identity when inserted and a permanent one when
//! promoted. This crate observes a record store, promotes temporary
//! identities before they reach the presentation, and applies identity-keyed
//! snapshot diffs so rendered rows stay consistent across promotion.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod view;

pub use config::{ConfigError, ReconcileConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::identity::{
    ContextId, PermanentId, RecordHandle, RecordId, RecordKind, RecordKindError, TemporaryId,
};
pub use model::snapshot::{DuplicateIdentity, Snapshot};
pub use repo::record_store::{ChangeBatch, RecordStore, StoreError, StoreResult};
pub use repo::sqlite_store::SqliteRecordStore;
pub use service::record_service::{RecordService, SaveError, SaveOperation, ServiceError};
pub use sync::observer::{ChangeObserver, FetchError};
pub use sync::pipeline::{PipelineError, ReconcilePipeline};
pub use sync::reconciler::{reconcile, ReconcileError};
pub use view::diff::{diff_snapshots, Insertion, Move, Removal, SnapshotDiff};
pub use view::projector::{
    AppliedTransition, PresentationSink, Projector, RecordingSink, RenderedRow,
};
