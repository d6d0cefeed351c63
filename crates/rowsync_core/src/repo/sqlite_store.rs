//! SQLite-backed managed record context.
//!
//! # Responsibility
//! - Track unsaved inserts, pending deletes and faulted-in rows for one
//!   context over a borrowed connection.
//! - Mint temporary identities on insert and reserve permanent ones from
//!   `id_sequence` on promotion.
//! - Publish membership changes to subscribers as ordered batches.
//!
//! # Invariants
//! - Permanent ids come only from `id_sequence`, reserved in one SQLite
//!   transaction per promotion batch.
//! - A failed reservation leaves every record of the batch untouched.
//! - Promotion alone publishes nothing; commit and rollback publish.
//! - A failed commit keeps the pending changes and publishes nothing.

use crate::model::identity::{
    ContextId, PermanentId, RecordHandle, RecordId, RecordKind, TemporaryId,
};
use crate::repo::record_store::{ChangeBatch, RecordStore, StoreError, StoreResult};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

const RECORD_SEQUENCE_NAME: &str = "records";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    /// Registered in this context, not yet written.
    Inserted,
    /// Backed by a `records` row.
    Persisted,
    /// Backed by a row that the next commit removes.
    Deleted,
}

#[derive(Debug, Clone)]
struct ManagedRecord {
    id: RecordId,
    kind: RecordKind,
    state: RecordState,
}

#[derive(Debug, Default)]
struct PendingChanges {
    inserted: BTreeSet<RecordHandle>,
    deleted: Vec<RecordId>,
    updated: BTreeSet<RecordHandle>,
}

impl PendingChanges {
    fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Managed record context over a migrated SQLite connection.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
    context: ContextId,
    next_temporary_seq: u64,
    next_handle: u64,
    records: BTreeMap<RecordHandle, ManagedRecord>,
    index: HashMap<RecordId, RecordHandle>,
    pending: PendingChanges,
    subscribers: Vec<Sender<ChangeBatch>>,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Opens a fresh context. `conn` must come from `db::open_db*`.
    pub fn new(conn: &'conn Connection) -> Self {
        let context = ContextId::new();
        debug!("event=context_open module=store status=ok context={context}");
        Self {
            conn,
            context,
            next_temporary_seq: 0,
            next_handle: 0,
            records: BTreeMap::new(),
            index: HashMap::new(),
            pending: PendingChanges::default(),
            subscribers: Vec::new(),
        }
    }

    /// Whether the context holds unsaved inserts or deletes.
    pub fn has_unsaved_changes(&self) -> bool {
        self.records
            .values()
            .any(|record| record.state != RecordState::Persisted)
    }

    fn register(&mut self, id: RecordId, kind: RecordKind, state: RecordState) -> RecordHandle {
        self.next_handle += 1;
        let handle = RecordHandle::from_raw(self.next_handle);
        self.records.insert(handle, ManagedRecord { id, kind, state });
        self.index.insert(id, handle);
        handle
    }

    fn forget(&mut self, handle: RecordHandle) -> Option<ManagedRecord> {
        let record = self.records.remove(&handle)?;
        self.index.remove(&record.id);
        self.pending.updated.remove(&handle);
        Some(record)
    }

    fn live_record(&self, handle: RecordHandle) -> StoreResult<&ManagedRecord> {
        self.records
            .get(&handle)
            .filter(|record| record.state != RecordState::Deleted)
            .ok_or(StoreError::UnknownRecord(handle))
    }

    /// Records a membership removal, cancelling an unpublished insert instead
    /// when the subscribers never saw the record.
    fn note_removed(&mut self, handle: RecordHandle, id: RecordId) {
        if !self.pending.inserted.remove(&handle) {
            self.pending.deleted.push(id);
        }
    }

    /// Reserves `count` consecutive ids and returns the first one.
    fn reserve_ids(&self, count: usize) -> StoreResult<PermanentId> {
        let count = i64::try_from(count)
            .map_err(|_| StoreError::InvalidData("promotion batch is too large".to_string()))?;

        let tx = self.conn.unchecked_transaction()?;
        let next: i64 = tx
            .query_row(
                "SELECT next_id FROM id_sequence WHERE name = ?1;",
                [RECORD_SEQUENCE_NAME],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "id_sequence row `{RECORD_SEQUENCE_NAME}` is missing"
                ))
            })?;
        let first = PermanentId::new(next).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid next_id `{next}` in id_sequence"))
        })?;
        let last = next.checked_add(count).ok_or_else(|| {
            StoreError::InvalidData("id_sequence would overflow".to_string())
        })?;

        tx.execute(
            "UPDATE id_sequence SET next_id = ?1 WHERE name = ?2;",
            params![last, RECORD_SEQUENCE_NAME],
        )?;
        tx.commit()?;
        Ok(first)
    }

    /// Moves every temporary record in `targets` to a permanent identity.
    ///
    /// `mark_updated` publishes the identity change for records whose insert
    /// was already published.
    fn assign_permanent_ids(
        &mut self,
        targets: &[RecordHandle],
        mark_updated: bool,
    ) -> StoreResult<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let started_at = Instant::now();
        let first = self.reserve_ids(targets.len()).map_err(|err| {
            error!(
                "event=record_promote module=store status=error context={} batch_size={} error={err}",
                self.context,
                targets.len()
            );
            err
        })?;

        for (offset, handle) in (first.get()..).zip(targets) {
            let Some(permanent) = PermanentId::new(offset) else {
                continue;
            };
            let Some(record) = self.records.get_mut(handle) else {
                continue;
            };
            let previous = std::mem::replace(&mut record.id, RecordId::Permanent(permanent));
            self.index.remove(&previous);
            self.index.insert(record.id, *handle);
            if mark_updated && !self.pending.inserted.contains(handle) {
                self.pending.updated.insert(*handle);
            }
        }

        info!(
            "event=record_promote module=store status=ok context={} batch_size={} first_id={} duration_ms={}",
            self.context,
            targets.len(),
            first.get(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn write_changes(
        conn: &Connection,
        inserts: &[(i64, String)],
        deletes: &[i64],
    ) -> StoreResult<()> {
        let tx = conn.unchecked_transaction()?;
        for (id, kind) in inserts {
            tx.execute(
                "INSERT INTO records (id, kind) VALUES (?1, ?2);",
                params![id, kind],
            )?;
        }
        for id in deletes {
            tx.execute("DELETE FROM records WHERE id = ?1;", [id])?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn context_id(&self) -> ContextId {
        self.context
    }

    fn insert(&mut self, kind: &RecordKind) -> StoreResult<RecordHandle> {
        self.next_temporary_seq += 1;
        let id = RecordId::Temporary(TemporaryId {
            context: self.context,
            seq: self.next_temporary_seq,
        });
        let handle = self.register(id, kind.clone(), RecordState::Inserted);
        self.pending.inserted.insert(handle);

        debug!(
            "event=record_insert module=store status=ok context={} kind={kind} id={id}",
            self.context
        );
        Ok(handle)
    }

    fn delete(&mut self, record: RecordHandle) -> StoreResult<()> {
        let current = self
            .records
            .get_mut(&record)
            .ok_or(StoreError::UnknownRecord(record))?;
        let id = current.id;

        match current.state {
            RecordState::Deleted => return Ok(()),
            RecordState::Persisted => {
                current.state = RecordState::Deleted;
                self.pending.updated.remove(&record);
            }
            RecordState::Inserted => {
                self.forget(record);
            }
        }
        self.note_removed(record, id);

        debug!(
            "event=record_delete module=store status=ok context={} id={id}",
            self.context
        );
        Ok(())
    }

    fn resolve(&mut self, id: RecordId) -> StoreResult<RecordHandle> {
        if let RecordId::Temporary(temporary) = id {
            if temporary.context != self.context {
                return Err(StoreError::ForeignContext {
                    id,
                    context: self.context,
                });
            }
        }

        if let Some(&handle) = self.index.get(&id) {
            return self
                .live_record(handle)
                .map(|_| handle)
                .map_err(|_| StoreError::UnknownIdentity(id));
        }

        let Some(permanent) = id.as_permanent() else {
            return Err(StoreError::UnknownIdentity(id));
        };
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM records WHERE id = ?1;",
                [permanent.get()],
                |row| row.get(0),
            )
            .optional()?;
        let kind = kind.ok_or(StoreError::UnknownIdentity(id))?;
        let kind = RecordKind::new(kind).map_err(|err| {
            StoreError::InvalidData(format!("{err} in records.kind for id {id}"))
        })?;

        Ok(self.register(id, kind, RecordState::Persisted))
    }

    fn identity_of(&self, record: RecordHandle) -> StoreResult<RecordId> {
        self.live_record(record).map(|managed| managed.id)
    }

    fn promote(&mut self, records: &BTreeSet<RecordHandle>) -> StoreResult<()> {
        let mut targets = Vec::with_capacity(records.len());
        for &handle in records {
            if self.live_record(handle)?.id.is_temporary() {
                targets.push(handle);
            }
        }
        self.assign_permanent_ids(&targets, false)
    }

    fn commit(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();

        let leftovers: Vec<RecordHandle> = self
            .records
            .iter()
            .filter(|(_, record)| record.state == RecordState::Inserted && record.id.is_temporary())
            .map(|(handle, _)| *handle)
            .collect();
        self.assign_permanent_ids(&leftovers, true)?;

        let mut inserts = Vec::new();
        let mut deletes = Vec::new();
        for record in self.records.values() {
            match (record.state, record.id.as_permanent()) {
                (RecordState::Inserted, Some(id)) => {
                    inserts.push((id.get(), record.kind.as_str().to_string()));
                }
                (RecordState::Deleted, Some(id)) => deletes.push(id.get()),
                (RecordState::Persisted, _) => {}
                (_, None) => {
                    return Err(StoreError::InvalidData(format!(
                        "temporary identity {} reached commit",
                        record.id
                    )));
                }
            }
        }

        if !inserts.is_empty() || !deletes.is_empty() {
            if let Err(err) = Self::write_changes(self.conn, &inserts, &deletes) {
                error!(
                    "event=context_commit module=store status=error context={} duration_ms={} error={err}",
                    self.context,
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }

            let deleted: Vec<RecordHandle> = self
                .records
                .iter()
                .filter(|(_, record)| record.state == RecordState::Deleted)
                .map(|(handle, _)| *handle)
                .collect();
            for handle in deleted {
                self.forget(handle);
            }
            for record in self.records.values_mut() {
                record.state = RecordState::Persisted;
            }

            info!(
                "event=context_commit module=store status=ok context={} inserted={} deleted={} duration_ms={}",
                self.context,
                inserts.len(),
                deletes.len(),
                started_at.elapsed().as_millis()
            );
        }

        self.process_pending_changes();
        Ok(())
    }

    fn rollback(&mut self) {
        let unsaved: Vec<(RecordHandle, RecordState)> = self
            .records
            .iter()
            .filter(|(_, record)| record.state != RecordState::Persisted)
            .map(|(handle, record)| (*handle, record.state))
            .collect();

        for (handle, state) in &unsaved {
            match state {
                RecordState::Inserted => {
                    if let Some(record) = self.forget(*handle) {
                        self.note_removed(*handle, record.id);
                    }
                }
                RecordState::Deleted => {
                    let Some(record) = self.records.get_mut(handle) else {
                        continue;
                    };
                    record.state = RecordState::Persisted;
                    let id = record.id;
                    match self.pending.deleted.iter().position(|deleted| *deleted == id) {
                        Some(position) => {
                            self.pending.deleted.remove(position);
                        }
                        None => {
                            self.pending.inserted.insert(*handle);
                        }
                    }
                }
                RecordState::Persisted => {}
            }
        }

        info!(
            "event=context_rollback module=store status=ok context={} discarded={}",
            self.context,
            unsaved.len()
        );
        self.process_pending_changes();
    }

    fn fetch_identities(&mut self, kind: &RecordKind) -> StoreResult<Vec<RecordId>> {
        let conn = self.conn;
        let mut stmt = conn.prepare("SELECT id FROM records WHERE kind = ?1 ORDER BY id ASC;")?;
        let mut rows = stmt.query([kind.as_str()])?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: i64 = row.get(0)?;
            let permanent = PermanentId::new(value).ok_or_else(|| {
                StoreError::InvalidData(format!("invalid id `{value}` in records.id"))
            })?;
            let id = RecordId::Permanent(permanent);
            let pending_delete = self
                .index
                .get(&id)
                .and_then(|handle| self.records.get(handle))
                .is_some_and(|record| record.state == RecordState::Deleted);
            if !pending_delete {
                ids.push(id);
            }
        }

        ids.extend(
            self.records
                .values()
                .filter(|record| record.state == RecordState::Inserted && record.kind == *kind)
                .map(|record| record.id),
        );
        ids.sort();
        Ok(ids)
    }

    fn process_pending_changes(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.pending);
        let current_ids = |handles: &BTreeSet<RecordHandle>| -> Vec<RecordId> {
            handles
                .iter()
                .filter_map(|handle| self.records.get(handle).map(|record| record.id))
                .collect()
        };
        let batch = ChangeBatch {
            inserted: current_ids(&pending.inserted),
            deleted: pending.deleted,
            updated: current_ids(&pending.updated),
        };

        debug!(
            "event=changes_publish module=store status=ok context={} inserted={} deleted={} updated={} subscribers={}",
            self.context,
            batch.inserted.len(),
            batch.deleted.len(),
            batch.updated.len(),
            self.subscribers.len()
        );
        self.subscribers
            .retain(|subscriber| subscriber.send(batch.clone()).is_ok());
    }

    fn subscribe(&mut self) -> Receiver<ChangeBatch> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }
}
