//! The migration state machine.
//!
//! `start` runs while the application holds the live database open: it
//! stages the key slots and exports the database into the pending set. The
//! live connection cannot be swapped out from under itself, so the caller
//! restarts the process. `finish` runs first thing on every start: it
//! validates the pending export, swaps it in behind a backup of the live
//! set and either commits or restores the backup.
//!
//! Key slots while a migration is staged:
//!
//! | slot    | holds                                       |
//! |---------|---------------------------------------------|
//! | current | target key (`None` = plaintext target)      |
//! | backup  | pre-migration key (`None` = plaintext main) |
//!
//! Commit clears `backup`; revert copies `backup` into `current` and then
//! clears it. Between runs the migrator keeps no state of its own.

use crate::config::MigrationConfig;
use crate::error::{FatalError, MigrationError, MigrationResult};
use sealdb_crypto::DatabaseKey;
use sealdb_db::rusqlite::Connection;
use sealdb_db::{
    DatabaseConfig, ExportError, FileSet, FileSystem, IntegrityError, StdFileSystem, export,
    open_database, probe,
};
use sealdb_keystore::KeyStore;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::{error, info, warn};

/// How `finish` resolved the state it found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing was pending.
    Noop,
    /// The export was swapped in; the new key is active.
    Done,
    /// A pending change could not be committed; the prior database and key
    /// are back in place.
    Canceled,
}

/// Drives encryption changes of one database file set.
pub struct Migrator {
    pub(crate) main: FileSet,
    pub(crate) pending: FileSet,
    pub(crate) backup: FileSet,
    pub(crate) keys: Arc<dyn KeyStore>,
    pub(crate) fs: Arc<dyn FileSystem>,
    config: MigrationConfig,
    running: Mutex<()>,
}

impl Migrator {
    /// Creates a migrator for the database at `main_path` with default
    /// settings.
    pub fn new(main_path: impl Into<PathBuf>, keys: Arc<dyn KeyStore>) -> Self {
        Self::with_config(main_path, keys, MigrationConfig::default())
    }

    /// Creates a migrator with explicit settings.
    pub fn with_config(
        main_path: impl Into<PathBuf>,
        keys: Arc<dyn KeyStore>,
        config: MigrationConfig,
    ) -> Self {
        let main = FileSet::new(main_path);
        let pending = main.with_suffix(&config.pending_suffix);
        let backup = main.with_suffix(&config.backup_suffix);
        Self {
            main,
            pending,
            backup,
            keys,
            fs: Arc::new(StdFileSystem),
            config,
            running: Mutex::new(()),
        }
    }

    /// Replaces the file system used for every file set operation.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// The live database file set.
    pub fn main_set(&self) -> &FileSet {
        &self.main
    }

    /// The pending export file set.
    pub fn pending_set(&self) -> &FileSet {
        &self.pending
    }

    /// The transient backup file set.
    pub fn backup_set(&self) -> &FileSet {
        &self.backup
    }

    /// Whether an export is waiting for `finish`.
    pub fn is_migration_pending(&self) -> bool {
        self.pending.exists(self.fs.as_ref())
    }

    /// Probes the main database with a caller-supplied key.
    pub fn check_database_access(&self, key: Option<&DatabaseKey>) -> Result<(), IntegrityError> {
        probe(self.main.main(), key)
    }

    /// Opens the main database with the current key.
    ///
    /// Refuses while a pending export or backup set is on disk, since
    /// `finish` has not settled the file set yet.
    pub fn open_main(&self, config: &DatabaseConfig) -> MigrationResult<Connection> {
        let fs = self.fs.as_ref();
        if self.pending.exists(fs) || self.backup.any_exists(fs) {
            return Err(MigrationError::FinishRequired);
        }
        let key = self.keys.current()?;
        Ok(open_database(self.main.main(), key.as_ref(), config)?)
    }

    /// Stages `new_key` and exports the live database into the pending set.
    ///
    /// On success the caller must restart the process before touching the
    /// database again; the swap happens in the next [`finish`](Self::finish).
    /// On failure other than [`ExportError::AlreadyExists`] the key slots are
    /// reverted and nothing on disk changed.
    pub fn start(&self, live: &Connection, new_key: Option<DatabaseKey>) -> MigrationResult<()> {
        let _running = self.lock()?;
        let fs = self.fs.as_ref();

        if self.pending.exists(fs) {
            warn!(
                path = %self.pending.main().display(),
                "Export already pending, finish it before starting another"
            );
            return Err(ExportError::AlreadyExists {
                path: self.pending.main().to_path_buf(),
            }
            .into());
        }

        let previous = self.keys.current()?;
        self.keys.set_backup(previous.as_ref(), true)?;
        if let Err(e) = self.keys.set_current(new_key.as_ref()) {
            if let Err(clear) = self.keys.set_backup(None, true) {
                warn!(error = %clear, "Could not clear staged backup key");
            }
            return Err(e.into());
        }
        info!(
            from_encrypted = previous.is_some(),
            to_encrypted = new_key.is_some(),
            "Staged database key change"
        );

        if let Err(e) = export(live, &self.pending, new_key.as_ref(), fs) {
            if !e.is_already_exists() {
                self.abandon_export()?;
            }
            return Err(e.into());
        }

        if self.config.verify_export {
            if let Err(e) = probe(self.pending.main(), new_key.as_ref()) {
                warn!(error = %e, "Exported database failed verification");
                self.abandon_export()?;
                return Err(ExportError::Verification(e).into());
            }
        }

        info!("Export ready, restart required to finish the migration");
        Ok(())
    }

    /// Settles whatever a previous `start` or interrupted `finish` left on
    /// disk. Must run before anything else opens the main database.
    pub fn finish(&self) -> MigrationResult<MigrationOutcome> {
        let _running = self.lock()?;
        let fs = self.fs.as_ref();

        let recovered = self.recover_interrupted_swap()?;
        if !self.pending.exists(fs) && self.pending.any_exists(fs) {
            warn!("Removing orphaned pending export log files");
            self.pending.delete(fs).map_err(MigrationError::Cleanup)?;
        }
        if let Some(outcome) = recovered {
            return Ok(outcome);
        }

        if !self.pending.exists(fs) {
            return self.reconcile_keys();
        }

        info!(path = %self.pending.main().display(), "Pending export found, finishing migration");
        let new_key = self.keys.current()?;
        let old_key = self.keys.backup()?;

        if let Err(e) = probe(self.pending.main(), new_key.as_ref()) {
            warn!(error = %e, "Pending export is unusable, canceling migration");
            self.pending.delete(fs).map_err(MigrationError::Cleanup)?;
            self.revert_keys()?;
            return Ok(MigrationOutcome::Canceled);
        }

        self.swap_in_pending(new_key.as_ref(), old_key.as_ref())
    }

    fn swap_in_pending(
        &self,
        new_key: Option<&DatabaseKey>,
        old_key: Option<&DatabaseKey>,
    ) -> MigrationResult<MigrationOutcome> {
        let fs = self.fs.as_ref();

        if let Err(e) = self.main.rename_to(&self.backup, fs) {
            error!(error = %e, "Could not move the live database aside");
            if let Err(undo) = self.backup.rename_to(&self.main, fs) {
                error!(error = %undo, "Could not undo the partial backup rename");
            }
            return Err(FatalError::BackupRename(e).into());
        }

        if let Err(e) = self.pending.rename_to(&self.main, fs) {
            error!(error = %e, "Could not install the pending export");
            self.undo_partial_install();
            return Err(FatalError::InstallRename(e).into());
        }

        match probe(self.main.main(), new_key) {
            Ok(()) => self.commit_swap(),
            Err(e) => self.rollback_install(e, old_key),
        }
    }

    /// Puts a half-installed export back under the pending name and the
    /// backup set back under the live name. Best effort: the caller reports
    /// the failure as fatal either way.
    fn undo_partial_install(&self) {
        let fs = self.fs.as_ref();
        if self.main.exists(fs) {
            if let Err(e) = self.main.rename_to(&self.pending, fs) {
                error!(error = %e, "Could not move the partial install back");
                return;
            }
        }
        if let Err(e) = self.backup.rename_to(&self.main, fs) {
            error!(error = %e, "Could not restore the backup after a failed install");
        }
    }

    /// The installed export opens with the new key: drop the backup.
    pub(crate) fn commit_swap(&self) -> MigrationResult<MigrationOutcome> {
        self.keys.set_backup(None, true)?;
        self.backup
            .delete(self.fs.as_ref())
            .map_err(MigrationError::Cleanup)?;
        info!("Database migration done");
        Ok(MigrationOutcome::Done)
    }

    /// The installed export is unusable: put the backup back and verify it
    /// with the pre-migration key.
    pub(crate) fn rollback_install(
        &self,
        cause: IntegrityError,
        old_key: Option<&DatabaseKey>,
    ) -> MigrationResult<MigrationOutcome> {
        let fs = self.fs.as_ref();
        warn!(error = %cause, "Installed export failed its probe, restoring backup");

        self.main.delete(fs).map_err(FatalError::RollbackDelete)?;
        self.backup
            .rename_to(&self.main, fs)
            .map_err(FatalError::RestoreRename)?;
        if let Err(e) = probe(self.main.main(), old_key) {
            error!(error = %e, "Restored database failed its sanity probe");
            return Err(FatalError::RollbackSanity(e).into());
        }

        self.revert_keys()?;
        info!("Database migration canceled, previous database restored");
        Ok(MigrationOutcome::Canceled)
    }

    /// Removes a failed export and restores the key slots. When the export
    /// cannot be removed the slots stay staged so that `finish` sees a
    /// consistent pending migration and cancels it.
    fn abandon_export(&self) -> MigrationResult<()> {
        if let Err(e) = self.pending.delete(self.fs.as_ref()) {
            warn!(error = %e, "Could not remove failed export, the next finish will cancel it");
            return Ok(());
        }
        self.revert_keys()
    }

    /// `current` := `backup`, then `backup` := none.
    pub(crate) fn revert_keys(&self) -> MigrationResult<()> {
        let previous = self.keys.backup()?;
        self.keys.set_current(previous.as_ref())?;
        self.keys.set_backup(None, true)?;
        info!(encrypted = previous.is_some(), "Restored pre-migration database key");
        Ok(())
    }

    fn lock(&self) -> MigrationResult<MutexGuard<'_, ()>> {
        match self.running.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(MigrationError::Busy),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("main", &self.main)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
