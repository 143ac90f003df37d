//! Whole-database export under a different key.
//!
//! Uses SQLCipher's `sqlcipher_export()`: the target is attached to the
//! live connection with its own key and the engine copies schema and data in
//! one native step. The header fields `sqlcipher_export()` leaves at zero
//! (`user_version`, `application_id`) are copied explicitly before detaching.

use crate::error::ExportError;
use crate::fileset::{FileSet, FileSystem};
use rusqlite::{Connection, params};
use sealdb_crypto::DatabaseKey;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const EXPORT_SCHEMA: &str = "sealdb_export";

/// Copies the database open on `source` into a fresh file set at `target`,
/// encrypted with `key` (or plaintext for `None`).
///
/// Fails with [`ExportError::AlreadyExists`] without touching anything if
/// the target main file is already there. On any other failure the target
/// file set is deleted before the error is returned.
pub fn export(
    source: &Connection,
    target: &FileSet,
    key: Option<&DatabaseKey>,
    fs: &dyn FileSystem,
) -> Result<(), ExportError> {
    if target.exists(fs) {
        return Err(ExportError::AlreadyExists {
            path: target.main().to_path_buf(),
        });
    }
    // Log files without a main file are leftovers of a crashed attempt.
    target.delete(fs)?;

    info!(
        target = %target.main().display(),
        encrypted = key.is_some(),
        "Starting database export"
    );
    match run_export(source, target, key) {
        Ok(()) => {
            info!(target = %target.main().display(), "Database export complete");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Database export failed, removing partial output");
            if let Err(detach) = source.execute_batch(&format!("DETACH DATABASE {EXPORT_SCHEMA}")) {
                debug!(error = %detach, "Export database was not attached");
            }
            if let Err(cleanup) = target.delete(fs) {
                warn!(error = %cleanup, "Could not remove partial export");
            }
            Err(ExportError::Database(e))
        }
    }
}

fn run_export(
    source: &Connection,
    target: &FileSet,
    key: Option<&DatabaseKey>,
) -> rusqlite::Result<()> {
    let literal = match key {
        Some(key) => key.sqlcipher_literal(),
        None => Zeroizing::new(String::new()),
    };
    let path = target.main().to_string_lossy().into_owned();
    source.execute(
        &format!("ATTACH DATABASE ?1 AS {EXPORT_SCHEMA} KEY ?2"),
        params![path, literal.as_str()],
    )?;
    source.query_row(&format!("SELECT sqlcipher_export('{EXPORT_SCHEMA}')"), [], |_| {
        Ok(())
    })?;
    copy_header_fields(source)?;
    source.execute_batch(&format!("DETACH DATABASE {EXPORT_SCHEMA}"))?;
    Ok(())
}

fn copy_header_fields(source: &Connection) -> rusqlite::Result<()> {
    for field in ["user_version", "application_id"] {
        let value: i64 = source.query_row(&format!("PRAGMA main.{field}"), [], |row| row.get(0))?;
        source.execute_batch(&format!("PRAGMA {EXPORT_SCHEMA}.{field} = {value}"))?;
    }
    Ok(())
}
