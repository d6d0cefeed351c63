//! Record store contract consumed by the reconciliation pipeline.
//!
//! # Responsibility
//! - Define the managed-context operations the observer, reconciler and
//!   service need: insert, delete, resolve, promote, commit, fetch.
//! - Define the change batches a store publishes to its subscribers.
//!
//! # Invariants
//! - One store value is one context; callers pass it explicitly.
//! - `promote` is all-or-nothing across the batch and idempotent for records
//!   that already hold a permanent identity.
//! - `commit` never persists a temporary identity.

use crate::db::DbError;
use crate::model::identity::{ContextId, RecordHandle, RecordId, RecordKind};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by record store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Identity is stale (promoted away, deleted) or was never known.
    UnknownIdentity(RecordId),
    /// Handle does not belong to a live record of this context.
    UnknownRecord(RecordHandle),
    /// Temporary identity minted by another context.
    ForeignContext {
        id: RecordId,
        context: ContextId,
    },
    InvalidData(String),
    /// Backing store cannot serve the request right now.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownIdentity(id) => write!(f, "unknown record identity: {id}"),
            Self::UnknownRecord(handle) => write!(f, "unknown record handle: {handle}"),
            Self::ForeignContext { id, context } => {
                write!(f, "identity {id} does not belong to context {context}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Unavailable(message) => write!(f, "record store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One batch of membership changes, identities as of publication time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub inserted: Vec<RecordId>,
    pub deleted: Vec<RecordId>,
    /// Records whose identity changed after their insertion was published.
    pub updated: Vec<RecordId>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Managed record context.
pub trait RecordStore {
    /// Context that scopes the temporary identities of this store.
    fn context_id(&self) -> ContextId;

    /// Registers a new unsaved record carrying a temporary identity.
    fn insert(&mut self, kind: &RecordKind) -> StoreResult<RecordHandle>;

    /// Marks a record deleted; unsaved records are forgotten immediately.
    fn delete(&mut self, record: RecordHandle) -> StoreResult<()>;

    /// Resolves an identity to its live record handle.
    fn resolve(&mut self, id: RecordId) -> StoreResult<RecordHandle>;

    /// Current identity of a live record.
    fn identity_of(&self, record: RecordHandle) -> StoreResult<RecordId>;

    /// Assigns permanent identities to every temporary record in the batch.
    fn promote(&mut self, records: &BTreeSet<RecordHandle>) -> StoreResult<()>;

    /// Persists pending inserts and deletes, then publishes their changes.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards unsaved inserts and pending deletes.
    fn rollback(&mut self);

    /// Identities of all live records of `kind`, in natural identity order.
    fn fetch_identities(&mut self, kind: &RecordKind) -> StoreResult<Vec<RecordId>>;

    /// Publishes pending membership changes to subscribers as one batch.
    fn process_pending_changes(&mut self);

    /// Opens a new change stream. Batches queue until received.
    fn subscribe(&mut self) -> Receiver<ChangeBatch>;
}
