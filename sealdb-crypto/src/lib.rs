//! Key material for SealDB.
//!
//! A [`DatabaseKey`] is the 32-byte raw SQLCipher key that opens the main
//! database file. Keys never print their bytes and are wiped on drop.

mod error;
mod key;

pub use error::{CryptoError, CryptoResult};
pub use key::{DatabaseKey, KEY_SIZE, same_key};
