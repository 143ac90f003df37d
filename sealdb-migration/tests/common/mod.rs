//! Shared test helpers for migration tests.

#![allow(dead_code)]

use sealdb_crypto::DatabaseKey;
use sealdb_db::rusqlite::{Connection, params};
use sealdb_db::{DatabaseConfig, FileSystem, StdFileSystem, open_database};
use sealdb_keystore::{KeyStore, MemoryKeyStore};
use sealdb_migration::{MigrationConfig, Migrator};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber when `RUST_LOG` is set.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// One row of the `records` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub payload: Vec<u8>,
}

pub fn insert_records(conn: &Connection, count: usize) {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            payload BLOB NOT NULL
        );",
    )
    .unwrap();
    for i in 0..count {
        conn.execute(
            "INSERT INTO records (name, payload) VALUES (?1, ?2)",
            params![format!("record-{i}"), vec![i as u8; 64 + i]],
        )
        .unwrap();
    }
}

pub fn read_records(conn: &Connection) -> Vec<Record> {
    let mut stmt = conn
        .prepare("SELECT id, name, payload FROM records ORDER BY id")
        .unwrap();
    stmt.query_map([], |row| {
        Ok(Record {
            id: row.get(0)?,
            name: row.get(1)?,
            payload: row.get(2)?,
        })
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

/// Opens the database at `path` and returns its records.
pub fn records_at(path: &Path, key: Option<&DatabaseKey>) -> Vec<Record> {
    let conn = open_database(path, key, &DatabaseConfig::default()).unwrap();
    read_records(&conn)
}

/// Drops the last `len` bytes of the file at `path`.
pub fn truncate_tail(path: &Path, len: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    let size = file.metadata().unwrap().len();
    file.set_len(size.saturating_sub(len)).unwrap();
}

/// Overwrites `len` bytes at `offset` with a fixed garbage pattern.
pub fn scribble(path: &Path, offset: usize, len: usize) {
    let mut bytes = std::fs::read(path).unwrap();
    for (i, b) in bytes.iter_mut().skip(offset).take(len).enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(7);
    }
    std::fs::write(path, bytes).unwrap();
}

/// A data directory and key slots that outlive individual migrators.
///
/// Each call to [`App::migrator`] stands in for a fresh process: nothing
/// carries over except the files and the key store.
pub struct App {
    pub dir: TempDir,
    pub keys: Arc<MemoryKeyStore>,
    pub fs: Arc<FaultyFs>,
}

impl App {
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: TempDir::new().unwrap(),
            keys: Arc::new(MemoryKeyStore::new()),
            fs: Arc::new(FaultyFs::default()),
        }
    }

    pub fn main_path(&self) -> PathBuf {
        self.dir.path().join("app.db")
    }

    pub fn migrator(&self) -> Migrator {
        self.migrator_with(MigrationConfig::default())
    }

    pub fn migrator_with(&self, config: MigrationConfig) -> Migrator {
        let keys: Arc<dyn KeyStore> = self.keys.clone();
        let fs: Arc<dyn FileSystem> = self.fs.clone();
        Migrator::with_config(self.main_path(), keys, config).with_file_system(fs)
    }

    /// Creates the main database under the current key with `count` records.
    pub fn seed(&self, count: usize) -> Vec<Record> {
        let conn = self.open();
        insert_records(&conn, count);
        read_records(&conn)
    }

    /// Opens the main database the way the application does after `finish`.
    pub fn open(&self) -> Connection {
        self.migrator()
            .open_main(&DatabaseConfig::default())
            .unwrap()
    }

    pub fn current_key(&self) -> Option<DatabaseKey> {
        self.keys.current().unwrap()
    }

    pub fn set_current_key(&self, key: &DatabaseKey) {
        self.keys.set_current(Some(key)).unwrap();
    }

    pub fn backup_key(&self) -> Option<DatabaseKey> {
        self.keys.backup().unwrap()
    }

    /// Runs `start` against a live connection, then closes it as a process
    /// restart would.
    pub fn start_and_restart(&self, key: Option<DatabaseKey>) {
        let conn = self.open();
        self.migrator().start(&conn, key).unwrap();
        drop(conn);
    }

    /// File names in the data directory, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// [`StdFileSystem`] with injectable failures.
#[derive(Default)]
pub struct FaultyFs {
    fail_rename_from: Mutex<Vec<PathBuf>>,
    fail_remove: Mutex<Vec<PathBuf>>,
    corrupt_rename_to: Mutex<Vec<PathBuf>>,
    renames: AtomicUsize,
}

impl FaultyFs {
    /// Renames whose source is `path` fail until [`FaultyFs::heal`].
    pub fn fail_rename_from(&self, path: impl Into<PathBuf>) {
        self.fail_rename_from.lock().unwrap().push(path.into());
    }

    /// Removals of `path` fail until [`FaultyFs::heal`].
    pub fn fail_remove(&self, path: impl Into<PathBuf>) {
        self.fail_remove.lock().unwrap().push(path.into());
    }

    /// The next rename onto `path` succeeds, then the first 64 bytes of the
    /// moved file are overwritten.
    pub fn corrupt_rename_to(&self, path: impl Into<PathBuf>) {
        self.corrupt_rename_to.lock().unwrap().push(path.into());
    }

    pub fn heal(&self) {
        self.fail_rename_from.lock().unwrap().clear();
        self.fail_remove.lock().unwrap().clear();
        self.corrupt_rename_to.lock().unwrap().clear();
    }

    /// Successful renames so far.
    pub fn renames(&self) -> usize {
        self.renames.load(Ordering::SeqCst)
    }
}

fn injected() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "injected failure")
}

impl FileSystem for FaultyFs {
    fn exists(&self, path: &Path) -> bool {
        StdFileSystem.exists(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove.lock().unwrap().iter().any(|p| p == path) {
            return Err(injected());
        }
        StdFileSystem.remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_rename_from.lock().unwrap().iter().any(|p| p == from) {
            return Err(injected());
        }
        StdFileSystem.rename(from, to)?;
        self.renames.fetch_add(1, Ordering::SeqCst);
        let mut corrupt = self.corrupt_rename_to.lock().unwrap();
        if let Some(i) = corrupt.iter().position(|p| p == to) {
            corrupt.remove(i);
            scribble(to, 0, 64);
        }
        Ok(())
    }

    fn list_with_prefix(&self, dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
        StdFileSystem.list_with_prefix(dir, prefix)
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        StdFileSystem.sync_dir(dir)
    }
}
