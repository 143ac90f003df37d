//! Error types for the database layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for connection management.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur opening or configuring a database connection.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database error from SQLCipher.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The supplied key does not open the database.
    #[error("wrong key for {}", path.display())]
    WrongKey { path: PathBuf },
}

/// Outcome of a failed integrity probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    /// The file set is missing or cannot be opened.
    #[error("database not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file opened but the engine rejected the key material.
    #[error("wrong key for {}", path.display())]
    WrongKey { path: PathBuf },

    /// The consistency check failed or the engine reported another error.
    #[error("database corrupted: {}: {detail}", path.display())]
    Corrupted { path: PathBuf, detail: String },
}

impl IntegrityError {
    /// Path of the probed database.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path } | Self::WrongKey { path } | Self::Corrupted { path, .. } => path,
        }
    }
}

/// A file set operation that failed on one of its members.
#[derive(Debug, Error)]
#[error("failed to {action} {}: {source}", path.display())]
pub struct FileSetError {
    /// What was being done (`rename`, `delete`, `list`).
    pub action: &'static str,
    /// The member that failed.
    pub path: PathBuf,
    /// The underlying IO error.
    #[source]
    pub source: std::io::Error,
}

/// Errors from the export engine.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A pending export already exists at the target path; an earlier
    /// attempt got at least this far and the file was left untouched.
    #[error("pending export already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// Attach, export or detach failed inside SQLCipher.
    #[error("export failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// The target file set could not be prepared or cleaned up.
    #[error("export file error: {0}")]
    FileSet(#[from] FileSetError),

    /// The export completed but the result failed its integrity probe.
    #[error("export verification failed: {0}")]
    Verification(IntegrityError),
}

impl ExportError {
    /// True when the failure means an earlier export is still on disk.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
