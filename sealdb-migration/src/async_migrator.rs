//! Async facade over [`Migrator`] for tokio applications.
//!
//! Every operation is file and SQLCipher I/O, so it runs on the blocking
//! pool.

use crate::error::{MigrationError, MigrationResult};
use crate::migrator::{MigrationOutcome, Migrator};
use sealdb_crypto::DatabaseKey;
use sealdb_db::rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Cloneable handle that runs migrator operations via `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct AsyncMigrator {
    inner: Arc<Migrator>,
}

impl AsyncMigrator {
    /// Wraps `migrator`; clones of the handle share it.
    pub fn new(migrator: Migrator) -> Self {
        Self {
            inner: Arc::new(migrator),
        }
    }

    /// The wrapped migrator, for the cheap synchronous queries
    /// (`is_migration_pending`, the file set accessors).
    pub fn migrator(&self) -> &Migrator {
        &self.inner
    }

    /// See [`Migrator::start`]. The live connection stays locked for the
    /// whole export.
    pub async fn start(
        &self,
        live: Arc<Mutex<Connection>>,
        new_key: Option<DatabaseKey>,
    ) -> MigrationResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let conn = live
                .lock()
                .map_err(|_| MigrationError::Task("live connection lock poisoned".to_string()))?;
            inner.start(&conn, new_key)
        })
        .await
        .map_err(|e| MigrationError::Task(e.to_string()))?
    }

    /// See [`Migrator::finish`].
    pub async fn finish(&self) -> MigrationResult<MigrationOutcome> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.finish())
            .await
            .map_err(|e| MigrationError::Task(e.to_string()))?
    }
}
