//! Error types for the key slot store.

use thiserror::Error;

/// Result type for key store operations.
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Errors that can occur reading or writing key slots.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted key material could not be decoded.
    #[error("corrupt key document: {0}")]
    Corrupt(String),

    /// A previous holder of the slot lock panicked.
    #[error("key store lock poisoned")]
    LockPoisoned,
}
