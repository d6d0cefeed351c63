use rowsync_core::db::open_db_in_memory;
use rowsync_core::{RecordId, RecordKind, RecordStore, SqliteRecordStore, StoreError};
use std::collections::BTreeSet;

fn entity() -> RecordKind {
    RecordKind::new("Entity").unwrap()
}

#[test]
fn insert_assigns_context_scoped_temporary_identity() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);

    let handle = store.insert(&entity()).unwrap();
    let id = store.identity_of(handle).unwrap();

    let RecordId::Temporary(temporary) = id else {
        panic!("expected a temporary identity, got {id}");
    };
    assert_eq!(temporary.context, store.context_id());
    assert_eq!(store.resolve(id).unwrap(), handle);
    assert!(store.has_unsaved_changes());
}

#[test]
fn promote_is_batched_idempotent_and_retires_temporary_tokens() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let first = store.insert(&entity()).unwrap();
    let second = store.insert(&entity()).unwrap();
    let temporary_first = store.identity_of(first).unwrap();

    let batch = BTreeSet::from([first, second]);
    store.promote(&batch).unwrap();
    let permanent_first = store.identity_of(first).unwrap();
    let permanent_second = store.identity_of(second).unwrap();
    assert!(!permanent_first.is_temporary());
    assert!(!permanent_second.is_temporary());
    assert!(permanent_first < permanent_second);

    store.promote(&batch).unwrap();
    assert_eq!(store.identity_of(first).unwrap(), permanent_first);

    let err = store.resolve(temporary_first).unwrap_err();
    assert!(matches!(err, StoreError::UnknownIdentity(id) if id == temporary_first));
    assert_eq!(store.resolve(permanent_first).unwrap(), first);
}

#[test]
fn promote_with_unknown_record_promotes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let kept = store.insert(&entity()).unwrap();
    let forgotten = store.insert(&entity()).unwrap();
    store.delete(forgotten).unwrap();

    let err = store
        .promote(&BTreeSet::from([kept, forgotten]))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownRecord(handle) if handle == forgotten));
    assert!(store.identity_of(kept).unwrap().is_temporary());
}

#[test]
fn failed_reservation_leaves_batch_temporary() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let first = store.insert(&entity()).unwrap();
    let second = store.insert(&entity()).unwrap();
    conn.execute_batch("DELETE FROM id_sequence;").unwrap();

    let err = store.promote(&BTreeSet::from([first, second])).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
    assert!(store.identity_of(first).unwrap().is_temporary());
    assert!(store.identity_of(second).unwrap().is_temporary());
}

#[test]
fn temporary_identity_from_another_context_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let mut first = SqliteRecordStore::new(&conn);
    let mut second = SqliteRecordStore::new(&conn);

    let handle = first.insert(&entity()).unwrap();
    let id = first.identity_of(handle).unwrap();

    let err = second.resolve(id).unwrap_err();
    assert!(matches!(err, StoreError::ForeignContext { .. }));
}

#[test]
fn commit_never_persists_temporary_identities() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let handle = store.insert(&entity()).unwrap();

    store.commit().unwrap();
    let id = store.identity_of(handle).unwrap();
    assert!(!id.is_temporary());
    assert!(!store.has_unsaved_changes());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM records;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);

    let mut other = SqliteRecordStore::new(&conn);
    assert_eq!(other.fetch_identities(&entity()).unwrap(), vec![id]);
    assert!(other.resolve(id).is_ok());
}

#[test]
fn fetch_sorts_permanent_first_and_filters_by_kind() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let other_kind = RecordKind::new("Other").unwrap();

    let saved = store.insert(&entity()).unwrap();
    store.commit().unwrap();
    let unsaved = store.insert(&entity()).unwrap();
    let foreign = store.insert(&other_kind).unwrap();

    assert_eq!(
        store.fetch_identities(&entity()).unwrap(),
        vec![
            store.identity_of(saved).unwrap(),
            store.identity_of(unsaved).unwrap()
        ]
    );
    assert_eq!(
        store.fetch_identities(&other_kind).unwrap(),
        vec![store.identity_of(foreign).unwrap()]
    );
}

#[test]
fn change_batches_follow_mutations_but_not_promotion() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let changes = store.subscribe();

    let handle = store.insert(&entity()).unwrap();
    let temporary = store.identity_of(handle).unwrap();
    store.process_pending_changes();
    let inserted = changes.try_recv().unwrap();
    assert_eq!(inserted.inserted, vec![temporary]);
    assert!(inserted.deleted.is_empty());

    store.process_pending_changes();
    store.promote(&BTreeSet::from([handle])).unwrap();
    store.commit().unwrap();
    assert!(changes.try_recv().is_err());

    let permanent = store.identity_of(handle).unwrap();
    store.delete(handle).unwrap();
    assert!(store.resolve(permanent).is_err());
    store.commit().unwrap();
    let deleted = changes.try_recv().unwrap();
    assert_eq!(deleted.deleted, vec![permanent]);
    assert!(store.fetch_identities(&entity()).unwrap().is_empty());
}

#[test]
fn deleting_an_unpublished_insert_publishes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let changes = store.subscribe();

    let handle = store.insert(&entity()).unwrap();
    store.delete(handle).unwrap();
    store.process_pending_changes();

    assert!(changes.try_recv().is_err());
    assert!(store.fetch_identities(&entity()).unwrap().is_empty());
}

#[test]
fn rollback_restores_pending_deletes_and_drops_unsaved_inserts() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let saved = store.insert(&entity()).unwrap();
    store.commit().unwrap();
    let saved_id = store.identity_of(saved).unwrap();
    let changes = store.subscribe();

    store.delete(saved).unwrap();
    let unsaved = store.insert(&entity()).unwrap();
    store.rollback();

    assert_eq!(store.fetch_identities(&entity()).unwrap(), vec![saved_id]);
    assert_eq!(store.resolve(saved_id).unwrap(), saved);
    assert!(matches!(
        store.identity_of(unsaved),
        Err(StoreError::UnknownRecord(_))
    ));
    assert!(!store.has_unsaved_changes());
    assert!(changes.try_recv().is_err());
}

#[test]
fn rollback_publishes_removal_of_observed_unsaved_insert() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let changes = store.subscribe();

    let handle = store.insert(&entity()).unwrap();
    let id = store.identity_of(handle).unwrap();
    store.process_pending_changes();
    changes.try_recv().unwrap();

    store.rollback();
    let batch = changes.try_recv().unwrap();
    assert_eq!(batch.deleted, vec![id]);
}
