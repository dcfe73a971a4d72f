use rusqlite::Connection;
use santa_core::db::migrations::latest_version;
use santa_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "groups");
    assert_table_exists(&conn, "participants");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("santa.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "participants");
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

#[test]
fn version_one_database_gains_event_columns_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch(
        "PRAGMA user_version = 1;
         INSERT INTO groups (id, code, name) VALUES ('g1', 'ABC234', 'Office');",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let (name, suggested_value, event_date): (String, Option<String>, Option<String>) = conn
        .query_row(
            "SELECT name, suggested_value, event_date FROM groups WHERE id = 'g1';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Office");
    assert_eq!(suggested_value, None);
    assert_eq!(event_date, None);
}

#[test]
fn receiver_can_only_be_assigned_once_across_participants() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO groups (id, code, name) VALUES ('g1', 'ABC234', 'Office');
         INSERT INTO participants (id, group_id, name, access_code)
         VALUES ('p1', 'g1', 'Ana', 'AAAA2222'),
                ('p2', 'g1', 'Bia', 'BBBB3333'),
                ('p3', 'g1', 'Caio', 'CCCC4444');
         UPDATE participants SET assigned_receiver_id = 'p3' WHERE id = 'p1';",
    )
    .unwrap();

    let duplicate = conn.execute(
        "UPDATE participants SET assigned_receiver_id = 'p3' WHERE id = 'p2';",
        [],
    );
    assert!(duplicate.is_err());
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
