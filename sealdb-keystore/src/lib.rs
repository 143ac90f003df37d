//! Key slots for SealDB.
//!
//! The migration engine reads and writes two slots:
//!
//! - **current**: the key that opens the live main database (absent means
//!   the database is not encrypted)
//! - **backup**: the pre-migration key, populated only while an encryption
//!   change is in flight
//!
//! Stores must make a write durable before returning whenever persistence
//! is requested, because the engine relies on the slots surviving a crash
//! exactly as last written.

mod error;
mod file;
mod memory;

pub use error::{KeyStoreError, KeyStoreResult};
pub use file::{DirectorySync, FileKeyStore};
pub use memory::MemoryKeyStore;

use sealdb_crypto::DatabaseKey;
use std::sync::Arc;

/// Durable storage for the current and backup database keys.
pub trait KeyStore: Send + Sync {
    /// Returns the key that should open the main database right now.
    fn current(&self) -> KeyStoreResult<Option<DatabaseKey>>;

    /// Replaces the current key. Always persisted before returning.
    fn set_current(&self, key: Option<&DatabaseKey>) -> KeyStoreResult<()>;

    /// Returns the pre-migration key, if a migration is staged.
    fn backup(&self) -> KeyStoreResult<Option<DatabaseKey>>;

    /// Replaces the backup key. With `persist_immediately == false` the
    /// change may stay in memory until the next persisting write.
    fn set_backup(&self, key: Option<&DatabaseKey>, persist_immediately: bool)
    -> KeyStoreResult<()>;
}

impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    fn current(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        (**self).current()
    }

    fn set_current(&self, key: Option<&DatabaseKey>) -> KeyStoreResult<()> {
        (**self).set_current(key)
    }

    fn backup(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        (**self).backup()
    }

    fn set_backup(
        &self,
        key: Option<&DatabaseKey>,
        persist_immediately: bool,
    ) -> KeyStoreResult<()> {
        (**self).set_backup(key, persist_immediately)
    }
}
