//! Read-only integrity probes.
//!
//! A probe opens an existing file set with a candidate key (never creating
//! it), runs a check and closes the connection on every path.
//!
//! When a `-wal` sits next to the probed file the connection is read-only
//! with checkpoint-on-close disabled, so the log is left exactly as it was.
//! Without one, a read-only connection on a WAL-mode file would create log
//! files it cannot remove again, so the file is opened read-write: there is
//! no log to merge and SQLite deletes the empty one it made on close.

use crate::connection::{apply_key, verify_key};
use crate::error::IntegrityError;
use crate::fileset::FileSet;
use rusqlite::config::DbConfig;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use sealdb_crypto::DatabaseKey;
use std::path::Path;
use tracing::debug;

/// Opens `path` with `key` and runs `PRAGMA integrity_check`.
///
/// Succeeds only if the file opens, the key is accepted and the check
/// reports `ok`.
pub fn probe(path: &Path, key: Option<&DatabaseKey>) -> Result<(), IntegrityError> {
    let conn = open_existing(path, key)?;
    let verdict: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|e| classify(path, e))?;
    drop(conn);

    if verdict != "ok" {
        return Err(IntegrityError::Corrupted {
            path: path.to_path_buf(),
            detail: verdict,
        });
    }
    debug!(path = %path.display(), encrypted = key.is_some(), "Integrity probe passed");
    Ok(())
}

/// Opens `path` with `key` and only checks that the key is accepted.
///
/// Much cheaper than [`probe`] on large databases: a single page read.
pub fn check_key(path: &Path, key: Option<&DatabaseKey>) -> Result<(), IntegrityError> {
    let conn = open_existing(path, key)?;
    verify_key(&conn).map_err(|e| classify(path, e))
}

fn open_existing(path: &Path, key: Option<&DatabaseKey>) -> Result<Connection, IntegrityError> {
    if !path.is_file() {
        return Err(IntegrityError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let has_log = FileSet::new(path).member("-wal").is_file();
    let mode = if has_log {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(path, mode | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .map_err(|e| classify(path, e))?;
    if has_log {
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_NO_CKPT_ON_CLOSE, true)
            .map_err(|e| classify(path, e))?;
    }
    apply_key(&conn, key).map_err(|e| classify(path, e))?;
    Ok(conn)
}

/// Maps an engine error onto the probe taxonomy.
///
/// `SQLITE_NOTADB` (26) is what SQLCipher reports when page 1 does not
/// decrypt, which covers both a wrong key and a key on a plaintext file.
pub fn classify(path: &Path, err: rusqlite::Error) -> IntegrityError {
    let path = path.to_path_buf();
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::NotADatabase => IntegrityError::WrongKey { path },
            ErrorCode::CannotOpen => IntegrityError::NotFound { path },
            _ => IntegrityError::Corrupted {
                path,
                detail: err.to_string(),
            },
        },
        _ => IntegrityError::Corrupted {
            path,
            detail: err.to_string(),
        },
    }
}
