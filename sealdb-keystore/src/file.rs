//! Key slots persisted in a small JSON document.
//!
//! Every persisting write goes through a staging file that is fsynced,
//! renamed over the document and followed by an fsync of the parent
//! directory, so after a crash the document holds either the previous or
//! the new slots and never a torn mix.

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::KeyStore;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sealdb_crypto::DatabaseKey;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout. Keys are base64 of the raw 32 bytes.
#[derive(Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyDocument {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup: Option<String>,
}

#[derive(Default)]
struct Slots {
    current: Option<DatabaseKey>,
    backup: Option<DatabaseKey>,
    /// A non-persisted backup write is waiting for the next flush.
    dirty: bool,
}

/// Flushes the entries of a directory to stable storage.
pub type DirectorySync = fn(&Path) -> io::Result<()>;

/// Key slots stored in a JSON file next to the application data.
pub struct FileKeyStore {
    path: PathBuf,
    slots: Mutex<Slots>,
    sync_dir: DirectorySync,
}

impl FileKeyStore {
    /// Opens the store at `path`, loading existing slots if the file exists.
    ///
    /// The file is not created until the first persisting write.
    pub fn open(path: impl Into<PathBuf>) -> KeyStoreResult<Self> {
        let path = path.into();
        Self::cleanup_staging(&path);

        let slots = if path.exists() {
            let raw = Zeroizing::new(fs::read(&path)?);
            let doc: KeyDocument = serde_json::from_slice(&raw)?;
            if doc.version != DOCUMENT_VERSION {
                return Err(KeyStoreError::Corrupt(format!(
                    "unsupported key document version {}",
                    doc.version
                )));
            }
            Slots {
                current: decode_slot("current", doc.current.as_deref())?,
                backup: decode_slot("backup", doc.backup.as_deref())?,
                dirty: false,
            }
        } else {
            Slots::default()
        };

        debug!(path = %path.display(), "Key store opened");
        Ok(Self {
            path,
            slots: Mutex::new(slots),
            sync_dir: fsync_dir,
        })
    }

    /// Replaces the directory fsync that follows each document rename, for
    /// platforms where a directory cannot be opened for syncing.
    pub fn with_directory_sync(mut self, sync: DirectorySync) -> Self {
        self.sync_dir = sync;
        self
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes any backup change made with `persist_immediately == false`.
    pub fn flush(&self) -> KeyStoreResult<()> {
        let mut slots = self.slots()?;
        if slots.dirty {
            self.replace_document(&slots)?;
            slots.dirty = false;
            self.sync_parent()?;
        }
        Ok(())
    }

    fn slots(&self) -> KeyStoreResult<MutexGuard<'_, Slots>> {
        self.slots.lock().map_err(|_| KeyStoreError::LockPoisoned)
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".staging");
        PathBuf::from(name)
    }

    /// Removes a staging file left behind by a crash mid-write.
    fn cleanup_staging(path: &Path) {
        let staging = Self::staging_path(path);
        if staging.exists() {
            warn!(path = %staging.display(), "Removing orphaned key store staging file");
            let _ = fs::remove_file(&staging);
        }
    }

    /// Writes `slots` to the staging file and renames it over the document.
    /// Once this returns `Ok` the document holds `slots`, even if the
    /// following directory sync fails.
    fn replace_document(&self, slots: &Slots) -> KeyStoreResult<()> {
        let doc = KeyDocument {
            version: DOCUMENT_VERSION,
            current: slots.current.as_ref().map(|k| STANDARD.encode(k.as_bytes())),
            backup: slots.backup.as_ref().map(|k| STANDARD.encode(k.as_bytes())),
        };
        let bytes = Zeroizing::new(serde_json::to_vec_pretty(&doc)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = Self::staging_path(&self.path);
        {
            let mut file = open_private(&staging)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn sync_parent(&self) -> KeyStoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            (self.sync_dir)(parent)?;
        }
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn current(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        Ok(self.slots()?.current.clone())
    }

    fn set_current(&self, key: Option<&DatabaseKey>) -> KeyStoreResult<()> {
        let mut slots = self.slots()?;
        let previous = std::mem::replace(&mut slots.current, key.cloned());
        if let Err(e) = self.replace_document(&slots) {
            slots.current = previous;
            return Err(e);
        }
        slots.dirty = false;
        self.sync_parent()
    }

    fn backup(&self) -> KeyStoreResult<Option<DatabaseKey>> {
        Ok(self.slots()?.backup.clone())
    }

    fn set_backup(&self, key: Option<&DatabaseKey>, persist_immediately: bool) -> KeyStoreResult<()> {
        let mut slots = self.slots()?;
        let previous = std::mem::replace(&mut slots.backup, key.cloned());
        if !persist_immediately {
            slots.dirty = true;
            return Ok(());
        }
        if let Err(e) = self.replace_document(&slots) {
            slots.backup = previous;
            return Err(e);
        }
        slots.dirty = false;
        self.sync_parent()
    }
}

impl std::fmt::Debug for FileKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn decode_slot(name: &str, encoded: Option<&str>) -> KeyStoreResult<Option<DatabaseKey>> {
    let Some(encoded) = encoded else {
        return Ok(None);
    };
    let raw = Zeroizing::new(
        STANDARD
            .decode(encoded)
            .map_err(|e| KeyStoreError::Corrupt(format!("{name} slot: {e}")))?,
    );
    DatabaseKey::from_slice(&raw)
        .map(Some)
        .map_err(|e| KeyStoreError::Corrupt(format!("{name} slot: {e}")))
}

fn open_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn fsync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
