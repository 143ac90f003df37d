//! Startup recovery: interrupted swaps and stale key slots.

use crate::error::{FatalError, MigrationResult};
use crate::migrator::{MigrationOutcome, Migrator};
use sealdb_db::{IntegrityError, check_key, probe};
use tracing::{debug, error, info, warn};

impl Migrator {
    /// Settles a backup set left behind by a `finish` that did not return.
    ///
    /// Returns an outcome when the interrupted run could be concluded here,
    /// `None` when the regular pending/reconcile path should continue.
    pub(crate) fn recover_interrupted_swap(&self) -> MigrationResult<Option<MigrationOutcome>> {
        let fs = self.fs.as_ref();

        if !self.backup.exists(fs) {
            if self.backup.any_exists(fs) {
                // Main file already moved back, log files were not.
                warn!("Completing an interrupted restore of database log files");
                self.backup
                    .rename_to(&self.main, fs)
                    .map_err(FatalError::RestoreRename)?;
            }
            return Ok(None);
        }

        if !self.main.exists(fs) {
            warn!("Previous run stopped after moving the live database aside, restoring it");
            self.backup
                .rename_to(&self.main, fs)
                .map_err(FatalError::RestoreRename)?;
            return Ok(None);
        }

        warn!("Previous run stopped before settling an installed export");
        let new_key = self.keys.current()?;
        match probe(self.main.main(), new_key.as_ref()) {
            Ok(()) => self.commit_swap().map(Some),
            Err(e) => {
                let old_key = self.keys.backup()?;
                self.rollback_install(e, old_key.as_ref()).map(Some)
            }
        }
    }

    /// Brings the key slots back in line with the main database when no
    /// export is pending.
    pub(crate) fn reconcile_keys(&self) -> MigrationResult<MigrationOutcome> {
        let current = self.keys.current()?;
        let backup = self.keys.backup()?;

        if !self.main.exists(self.fs.as_ref()) {
            if backup.is_some() {
                self.keys.set_backup(None, true)?;
            }
            debug!("No main database, nothing to finish");
            return Ok(MigrationOutcome::Noop);
        }

        match check_key(self.main.main(), current.as_ref()) {
            Ok(()) => {
                if backup.is_some() {
                    info!("Clearing stale backup key");
                    self.keys.set_backup(None, true)?;
                }
                Ok(MigrationOutcome::Noop)
            }
            Err(IntegrityError::WrongKey { .. }) => {
                match check_key(self.main.main(), backup.as_ref()) {
                    Ok(()) => {
                        warn!("Current key does not open the database, restoring the previous key");
                        self.revert_keys()?;
                        Ok(MigrationOutcome::Canceled)
                    }
                    Err(e) => {
                        error!(error = %e, "No stored key opens the database");
                        Err(FatalError::NoUsableKey(e).into())
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not verify the database key");
                Ok(MigrationOutcome::Noop)
            }
        }
    }
}
