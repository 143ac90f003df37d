//! SQLCipher connection setup.

use crate::error::{DbError, DbResult};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use sealdb_crypto::DatabaseKey;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// Journal mode applied to connections opened by [`open_database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead log (`-wal` and `-shm` siblings).
    Wal,
    /// Rollback journal (`-journal` sibling while writing).
    Delete,
}

impl JournalMode {
    fn as_pragma(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Connection settings for the main database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Journal mode set after the key is verified.
    pub journal_mode: JournalMode,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
    /// Keep temporary tables and indices in memory so decrypted pages never
    /// spill to unencrypted temp files.
    pub memory_temp_store: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            busy_timeout: Duration::from_secs(5),
            memory_temp_store: true,
        }
    }
}

/// Opens (or creates) a database at `path` with the given key.
///
/// A `None` key opens the file unencrypted. The key is verified by reading
/// `sqlite_master` before any other pragma runs, because SQLCipher defers
/// key checks until the first page read.
pub fn open_database(
    path: &Path,
    key: Option<&DatabaseKey>,
    config: &DatabaseConfig,
) -> DbResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    apply_key(&conn, key)?;
    verify_key(&conn).map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::NotADatabase => {
            DbError::WrongKey {
                path: path.to_path_buf(),
            }
        }
        other => DbError::Database(other),
    })?;

    conn.busy_timeout(config.busy_timeout)?;
    if config.memory_temp_store {
        conn.pragma_update(None, "temp_store", "MEMORY")?;
    }
    let mode: String = conn.pragma_update_and_check(
        None,
        "journal_mode",
        config.journal_mode.as_pragma(),
        |row| row.get(0),
    )?;

    debug!(
        path = %path.display(),
        encrypted = key.is_some(),
        journal_mode = %mode,
        "Database opened"
    );
    Ok(conn)
}

/// Issues `PRAGMA key` with the raw-key literal. Must be the first statement
/// on the connection. A `None` key leaves the connection unencrypted.
pub fn apply_key(conn: &Connection, key: Option<&DatabaseKey>) -> rusqlite::Result<()> {
    let Some(key) = key else {
        return Ok(());
    };
    let literal = key.sqlcipher_literal();
    let pragma = Zeroizing::new(format!("PRAGMA key = \"{}\";", literal.as_str()));
    conn.execute_batch(&pragma)
}

/// Touches `sqlite_master`, which fails with `SQLITE_NOTADB` on a wrong key.
pub fn verify_key(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(())
}
