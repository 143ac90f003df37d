//! SQLCipher database layer for SealDB.
//!
//! Everything the migration engine needs from the storage engine itself:
//!
//! - **Connections**: open a database with a raw key, verify it and apply
//!   the standard pragmas ([`open_database`])
//! - **File sets**: a database and its log files moved and deleted as one
//!   unit ([`FileSet`], [`FileSystem`])
//! - **Integrity prober**: read-only open plus `PRAGMA integrity_check`
//!   ([`probe`], [`check_key`])
//! - **Export engine**: full copy into a new file under another key
//!   ([`export`])

mod connection;
mod error;
mod export;
mod fileset;
mod probe;

pub use connection::{DatabaseConfig, JournalMode, apply_key, open_database, verify_key};
pub use error::{DbError, DbResult, ExportError, FileSetError, IntegrityError};
pub use export::export;
pub use fileset::{FileSet, FileSystem, MEMBER_SUFFIXES, StdFileSystem};
pub use probe::{check_key, classify, probe};

pub use rusqlite;
