use rowsync_core::db::migrations::latest_version;
use rowsync_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "records");
    assert_table_exists(&conn, "id_sequence");
}

#[test]
fn id_sequence_starts_at_one() {
    let conn = open_db_in_memory().unwrap();

    let next_id: i64 = conn
        .query_row(
            "SELECT next_id FROM id_sequence WHERE name = 'records';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(next_id, 1);
}

#[test]
fn reopening_database_keeps_schema_and_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rowsync.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute_batch("UPDATE id_sequence SET next_id = 42 WHERE name = 'records';")
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let next_id: i64 = conn_second
        .query_row("SELECT next_id FROM id_sequence;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(next_id, 42);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
