//! In-process key slots.

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::KeyStore;
use sealdb_crypto::DatabaseKey;
use std::sync::Mutex;

#[derive(Default)]
struct Slots {
    current: Option<DatabaseKey>,
    backup: Option<DatabaseKey>,
}

/// Key slots held in memory (for testing and ephemeral databases).
///
/// Share one instance behind an `Arc` to simulate slots surviving a
/// process restart.
#[derive(Default)]
pub struct MemoryKeyStore {
    slots: Mutex<Slots>,
}

impl MemoryKeyStore {
    /// Creates a store with both slots empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose current slot holds `key`.
    pub fn with_current(key: DatabaseKey) -> Self {
        Self {
            slots: Mutex::new(Slots {
                current: Some(key),
                backup: None,
            }),
        }
    }

    fn slots(&self) -> KeyStoreResult<std::sync::MutexGuard<'_, Slots>> {
        self.slots.lock().map_err(|_| KeyStoreError::LockPoisoned)
    }
}

impl KeyStore for MemoryKeyStore {
    fn current(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        Ok(self.slots()?.current.clone())
    }

    fn set_current(&self, key: Option<&DatabaseKey>) -> KeyStoreResult<()> {
        self.slots()?.current = key.cloned();
        Ok(())
    }

    fn backup(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        Ok(self.slots()?.backup.clone())
    }

    fn set_backup(&self, key: Option<&DatabaseKey>, _persist_immediately: bool) -> KeyStoreResult<()> {
        self.slots()?.backup = key.cloned();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyStore").finish_non_exhaustive()
    }
}
