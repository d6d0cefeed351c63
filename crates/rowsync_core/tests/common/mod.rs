#![allow(dead_code)]

use rowsync_core::{
    ChangeBatch, ContextId, RecordHandle, RecordId, RecordKind, RecordStore, StoreError,
    StoreResult,
};
use std::collections::BTreeSet;
use std::sync::mpsc::Receiver;

/// Store wrapper that can simulate outages and records what it was asked.
pub struct FaultyStore<S> {
    inner: S,
    pub fail_promote: bool,
    pub fail_commit: bool,
    pub fail_fetch: bool,
    pub promote_calls: usize,
    pub fetches: Vec<Vec<RecordId>>,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_promote: false,
            fail_commit: false,
            fail_fetch: false,
            promote_calls: 0,
            fetches: Vec::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn last_fetch(&self) -> &[RecordId] {
        self.fetches.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

fn outage(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("simulated outage during {operation}"))
}

impl<S: RecordStore> RecordStore for FaultyStore<S> {
    fn context_id(&self) -> ContextId {
        self.inner.context_id()
    }

    fn insert(&mut self, kind: &RecordKind) -> StoreResult<RecordHandle> {
        self.inner.insert(kind)
    }

    fn delete(&mut self, record: RecordHandle) -> StoreResult<()> {
        self.inner.delete(record)
    }

    fn resolve(&mut self, id: RecordId) -> StoreResult<RecordHandle> {
        self.inner.resolve(id)
    }

    fn identity_of(&self, record: RecordHandle) -> StoreResult<RecordId> {
        self.inner.identity_of(record)
    }

    fn promote(&mut self, records: &BTreeSet<RecordHandle>) -> StoreResult<()> {
        self.promote_calls += 1;
        if self.fail_promote {
            return Err(outage("promote"));
        }
        self.inner.promote(records)
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.fail_commit {
            return Err(outage("commit"));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) {
        self.inner.rollback()
    }

    fn fetch_identities(&mut self, kind: &RecordKind) -> StoreResult<Vec<RecordId>> {
        if self.fail_fetch {
            return Err(outage("fetch"));
        }
        let ids = self.inner.fetch_identities(kind)?;
        self.fetches.push(ids.clone());
        Ok(ids)
    }

    fn process_pending_changes(&mut self) {
        self.inner.process_pending_changes()
    }

    fn subscribe(&mut self) -> Receiver<ChangeBatch> {
        self.inner.subscribe()
    }
}
