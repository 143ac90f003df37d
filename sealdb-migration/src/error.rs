//! Error types for the migration engine.

use sealdb_db::{DbError, ExportError, FileSetError, IntegrityError};
use sealdb_keystore::KeyStoreError;
use thiserror::Error;

/// Result type for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors surfaced by [`Migrator`](crate::Migrator).
#[derive(Debug, Error)]
pub enum MigrationError {
    /// `start` could not produce a pending export. Unless the cause is
    /// [`ExportError::AlreadyExists`], key slots were reverted and the
    /// database is exactly as before.
    #[error("export failed: {0}")]
    ExportFailed(#[from] ExportError),

    /// The engine can no longer guarantee that the user's data is safe.
    /// Never retried automatically.
    #[error("fatal migration error: {0}")]
    Fatal(#[from] FatalError),

    /// Another `start` or `finish` is running in this process.
    #[error("a migration operation is already running")]
    Busy,

    /// Reading or writing a key slot failed.
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// Opening the main database failed.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// A pending export or backup set is on disk; `finish` must run before
    /// the main database is opened.
    #[error("a migration must be finished before the database is opened")]
    FinishRequired,

    /// The migration settled but leftover files could not be removed.
    /// The next `finish` removes them.
    #[error("cleanup failed: {0}")]
    Cleanup(FileSetError),

    /// The blocking task running the operation failed.
    #[error("migration task failed: {0}")]
    Task(String),
}

impl MigrationError {
    /// True when the application should stop using the database and offer
    /// the user a support channel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Failures that leave the file system in a state the engine will not
/// repair on its own.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Moving the live file set aside to the backup name failed.
    #[error("could not move the live database aside: {0}")]
    BackupRename(FileSetError),

    /// Moving the pending export into the live name failed.
    #[error("could not install the pending export: {0}")]
    InstallRename(FileSetError),

    /// Removing the rejected export during rollback failed.
    #[error("could not remove the rejected database: {0}")]
    RollbackDelete(FileSetError),

    /// Moving the backup set back into place failed.
    #[error("could not restore the backup database: {0}")]
    RestoreRename(FileSetError),

    /// The restored database does not pass its integrity probe with the
    /// pre-migration key.
    #[error("restored database failed its sanity probe: {0}")]
    RollbackSanity(IntegrityError),

    /// Neither the current nor the backup key opens the main database.
    #[error("no stored key opens the database: {0}")]
    NoUsableKey(IntegrityError),
}
