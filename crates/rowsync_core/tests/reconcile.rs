mod common;

use common::FaultyStore;
use rowsync_core::db::open_db_in_memory;
use rowsync_core::{
    reconcile, ReconcileError, RecordId, RecordKind, RecordStore, Snapshot, SqliteRecordStore,
    StoreError,
};

fn entity() -> RecordKind {
    RecordKind::new("Entity").unwrap()
}

fn snapshot(ids: Vec<RecordId>) -> Snapshot<RecordId> {
    Snapshot::new(ids).unwrap()
}

#[test]
fn temporaries_are_replaced_in_place() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let saved = store.insert(&entity()).unwrap();
    store.commit().unwrap();
    let saved_id = store.identity_of(saved).unwrap();
    let first = store.insert(&entity()).unwrap();
    let second = store.insert(&entity()).unwrap();
    let first_temp = store.identity_of(first).unwrap();
    let second_temp = store.identity_of(second).unwrap();

    let observed = snapshot(vec![second_temp, saved_id, first_temp]);
    let reconciled = reconcile(&mut store, &observed).unwrap();

    assert_eq!(reconciled.len(), observed.len());
    assert!(reconciled.iter().all(|id| !id.is_temporary()));
    assert_eq!(
        reconciled.as_slice(),
        &[
            store.identity_of(second).unwrap(),
            saved_id,
            store.identity_of(first).unwrap(),
        ]
    );
}

#[test]
fn permanent_only_snapshot_is_returned_without_touching_store() {
    let conn = open_db_in_memory().unwrap();
    let mut store = FaultyStore::new(SqliteRecordStore::new(&conn));
    store.insert(&entity()).unwrap();
    store.commit().unwrap();
    let observed = snapshot(store.fetch_identities(&entity()).unwrap());
    store.fail_promote = true;
    let promote_calls = store.promote_calls;

    let reconciled = reconcile(&mut store, &observed).unwrap();

    assert_eq!(reconciled, observed);
    assert_eq!(store.promote_calls, promote_calls);
}

#[test]
fn empty_snapshot_reconciles_to_empty() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);

    let reconciled = reconcile(&mut store, &Snapshot::empty()).unwrap();
    assert!(reconciled.is_empty());
}

#[test]
fn repeated_reconciliation_of_observed_state_is_stable() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    store.insert(&entity()).unwrap();
    store.insert(&entity()).unwrap();

    let observed = snapshot(store.fetch_identities(&entity()).unwrap());
    let first_pass = reconcile(&mut store, &observed).unwrap();

    let observed_again = snapshot(store.fetch_identities(&entity()).unwrap());
    assert_eq!(observed_again, first_pass);
    let second_pass = reconcile(&mut store, &observed_again).unwrap();
    assert_eq!(second_pass, first_pass);
}

#[test]
fn promotion_is_requested_once_per_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let mut store = FaultyStore::new(SqliteRecordStore::new(&conn));
    for _ in 0..3 {
        store.insert(&entity()).unwrap();
    }

    let observed = snapshot(store.fetch_identities(&entity()).unwrap());
    reconcile(&mut store, &observed).unwrap();

    assert_eq!(store.promote_calls, 1);
}

#[test]
fn promotion_failure_abandons_rewrite() {
    let conn = open_db_in_memory().unwrap();
    let mut store = FaultyStore::new(SqliteRecordStore::new(&conn));
    let first = store.insert(&entity()).unwrap();
    let second = store.insert(&entity()).unwrap();
    let observed = snapshot(store.fetch_identities(&entity()).unwrap());
    store.fail_promote = true;

    let err = reconcile(&mut store, &observed).unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Promotion(StoreError::Unavailable(_))
    ));
    assert!(store.identity_of(first).unwrap().is_temporary());
    assert!(store.identity_of(second).unwrap().is_temporary());
}

#[test]
fn stale_temporary_identity_fails_resolution() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteRecordStore::new(&conn);
    let handle = store.insert(&entity()).unwrap();
    let observed = snapshot(store.fetch_identities(&entity()).unwrap());
    store.delete(handle).unwrap();

    let err = reconcile(&mut store, &observed).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Resolve {
            source: StoreError::UnknownIdentity(_),
            ..
        }
    ));
}

#[test]
fn foreign_temporary_identity_fails_resolution() {
    let conn = open_db_in_memory().unwrap();
    let mut owner = SqliteRecordStore::new(&conn);
    let mut other = SqliteRecordStore::new(&conn);
    owner.insert(&entity()).unwrap();
    let observed = snapshot(owner.fetch_identities(&entity()).unwrap());

    let err = reconcile(&mut other, &observed).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Resolve {
            source: StoreError::ForeignContext { .. },
            ..
        }
    ));
}
