//! Database file sets.
//!
//! A SQLite database is a main file plus sibling log files (`-wal`, `-shm`
//! and, in rollback-journal mode, `-journal`). Every move or delete treats
//! them as one unit:
//!
//! - renames move the main file first, so a crash mid-rename leaves the
//!   main file at its destination or at its source, never at both
//! - deletes remove the log files first and the main file last, so a set
//!   whose main file still exists has lost nothing the main file needs
//!
//! After each operation the parent directory is fsynced so the new names
//! are durable before the caller moves on.

use crate::error::FileSetError;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Member suffixes, main file first.
pub const MEMBER_SUFFIXES: [&str; 4] = ["", "-wal", "-shm", "-journal"];

/// Primitive file operations used on file sets.
///
/// The default [`StdFileSystem`] maps straight onto `std::fs`; tests swap in
/// implementations that fail on demand.
pub trait FileSystem: Send + Sync {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Removes the file at `path`.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Lists files in `dir` whose name starts with `prefix`.
    fn list_with_prefix(&self, dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>>;

    /// Flushes directory entries of `dir` to stable storage.
    fn sync_dir(&self, dir: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn list_with_prefix(&self, dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    fn sync_dir(&self, dir: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            let dir = OpenOptions::new().read(true).open(dir)?;
            dir.sync_all()?;
        }
        #[cfg(not(unix))]
        let _ = dir;
        Ok(())
    }
}

/// A main database file and its log file siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    main: PathBuf,
}

impl FileSet {
    /// File set whose main file is `main`.
    pub fn new(main: impl Into<PathBuf>) -> Self {
        Self { main: main.into() }
    }

    /// The main database file.
    pub fn main(&self) -> &Path {
        &self.main
    }

    /// A sibling set named by appending `suffix` to the main file name
    /// (`app.db` + `.pending` gives `app.db.pending`, `app.db.pending-wal`, ...).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self::new(self.member(suffix))
    }

    /// Path of the member with the given suffix.
    pub fn member(&self, suffix: &str) -> PathBuf {
        let mut name = self.main.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// All candidate member paths, main file first.
    pub fn members(&self) -> Vec<PathBuf> {
        MEMBER_SUFFIXES.iter().map(|s| self.member(s)).collect()
    }

    /// Whether the main file exists. Log files alone do not make a database.
    pub fn exists(&self, fs: &dyn FileSystem) -> bool {
        fs.exists(&self.main)
    }

    /// Whether any member exists.
    pub fn any_exists(&self, fs: &dyn FileSystem) -> bool {
        self.members().iter().any(|p| fs.exists(p))
    }

    /// Deletes every member present, log files first and the main file last.
    pub fn delete(&self, fs: &dyn FileSystem) -> Result<(), FileSetError> {
        let mut removed = false;
        for path in self.members().iter().rev() {
            if !fs.exists(path) {
                continue;
            }
            match fs.remove_file(path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FileSetError {
                        action: "delete",
                        path: path.clone(),
                        source: e,
                    });
                }
            }
        }
        if removed {
            debug!(path = %self.main.display(), "Deleted file set");
            self.sync_parent(fs)?;
        }
        Ok(())
    }

    /// Moves every present member onto the matching member of `target`,
    /// main file first. Members absent here are left alone at the target.
    pub fn rename_to(&self, target: &FileSet, fs: &dyn FileSystem) -> Result<(), FileSetError> {
        let mut moved = false;
        for suffix in MEMBER_SUFFIXES {
            let from = self.member(suffix);
            if !fs.exists(&from) {
                continue;
            }
            let to = target.member(suffix);
            fs.rename(&from, &to).map_err(|e| FileSetError {
                action: "rename",
                path: from.clone(),
                source: e,
            })?;
            moved = true;
        }
        if moved {
            debug!(
                from = %self.main.display(),
                to = %target.main.display(),
                "Renamed file set"
            );
            self.sync_parent(fs)?;
            if target.main.parent() != self.main.parent() {
                target.sync_parent(fs)?;
            }
        }
        Ok(())
    }

    /// Files in the parent directory whose name starts with the main file
    /// name, including strays that are not regular members.
    pub fn list_siblings(&self, fs: &dyn FileSystem) -> Result<Vec<PathBuf>, FileSetError> {
        let (dir, prefix) = self.split();
        fs.list_with_prefix(&dir, &prefix).map_err(|e| FileSetError {
            action: "list",
            path: dir.clone(),
            source: e,
        })
    }

    fn sync_parent(&self, fs: &dyn FileSystem) -> Result<(), FileSetError> {
        let (dir, _) = self.split();
        fs.sync_dir(&dir).map_err(|e| FileSetError {
            action: "sync",
            path: dir.clone(),
            source: e,
        })
    }

    fn split(&self) -> (PathBuf, String) {
        let dir = match self.main.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = self
            .main
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir, prefix)
    }
}
