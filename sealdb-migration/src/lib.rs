//! Crash-safe encryption migrations for SealDB.
//!
//! Turning encryption on, rotating the key and turning it off are all the
//! same operation: export the live database under the target key, restart,
//! swap the export in. [`Migrator::start`] does the first half while the
//! application runs; [`Migrator::finish`] does the second half on the next
//! start, before anything else opens the database, and also repairs
//! whatever a crash at any earlier point left behind.
//!
//! ```no_run
//! use sealdb_crypto::DatabaseKey;
//! use sealdb_db::DatabaseConfig;
//! use sealdb_keystore::FileKeyStore;
//! use sealdb_migration::{MigrationOutcome, Migrator};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = Arc::new(FileKeyStore::open("keys.json")?);
//! let migrator = Migrator::new("app.db", keys);
//!
//! // Every process start.
//! match migrator.finish()? {
//!     MigrationOutcome::Canceled => eprintln!("encryption change was rolled back"),
//!     MigrationOutcome::Done | MigrationOutcome::Noop => {}
//! }
//! let conn = migrator.open_main(&DatabaseConfig::default())?;
//!
//! // Later, on user request.
//! migrator.start(&conn, Some(DatabaseKey::generate()))?;
//! // Restart the process.
//! # Ok(())
//! # }
//! ```

mod async_migrator;
mod config;
mod error;
mod migrator;
mod recovery;

pub use async_migrator::AsyncMigrator;
pub use config::MigrationConfig;
pub use error::{FatalError, MigrationError, MigrationResult};
pub use migrator::{MigrationOutcome, Migrator};
