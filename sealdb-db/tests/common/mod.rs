//! Shared test helpers for database tests.

#![allow(dead_code)]

use sealdb_crypto::DatabaseKey;
use sealdb_db::rusqlite::{Connection, params};
use sealdb_db::{DatabaseConfig, open_database};
use std::path::Path;

/// One row of the `records` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub payload: Vec<u8>,
}

/// Creates the `records` table and inserts `count` deterministic rows.
pub fn insert_records(conn: &Connection, count: usize) {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            payload BLOB NOT NULL
        );",
    )
    .unwrap();
    for i in 0..count {
        conn.execute(
            "INSERT INTO records (name, payload) VALUES (?1, ?2)",
            params![format!("record-{i}"), vec![i as u8; 64 + i]],
        )
        .unwrap();
    }
}

/// Reads every row of `records` ordered by id.
pub fn read_records(conn: &Connection) -> Vec<Record> {
    let mut stmt = conn
        .prepare("SELECT id, name, payload FROM records ORDER BY id")
        .unwrap();
    stmt.query_map([], |row| {
        Ok(Record {
            id: row.get(0)?,
            name: row.get(1)?,
            payload: row.get(2)?,
        })
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

/// Creates a database at `path` holding `count` records and closes it.
pub fn seed_database(path: &Path, key: Option<&DatabaseKey>, count: usize) -> Vec<Record> {
    let conn = open_database(path, key, &DatabaseConfig::default()).unwrap();
    insert_records(&conn, count);
    let records = read_records(&conn);
    drop(conn);
    records
}

/// Opens the database at `path` and returns its records.
pub fn records_at(path: &Path, key: Option<&DatabaseKey>) -> Vec<Record> {
    let conn = open_database(path, key, &DatabaseConfig::default()).unwrap();
    read_records(&conn)
}

/// Overwrites `len` bytes at `offset` with a fixed garbage pattern.
pub fn scribble(path: &Path, offset: usize, len: usize) {
    let mut bytes = std::fs::read(path).unwrap();
    for (i, b) in bytes.iter_mut().skip(offset).take(len).enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(7);
    }
    std::fs::write(path, bytes).unwrap();
}
