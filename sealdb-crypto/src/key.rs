//! Database key material.
//!
//! SQLCipher is always driven in raw-key mode: the 32 key bytes are handed
//! to the engine as an `x'<hex>'` literal, which bypasses its PBKDF2 step.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of database keys in bytes (256 bits, SQLCipher raw key).
pub const KEY_SIZE: usize = 32;

/// A database encryption key with automatic zeroization on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DatabaseKey {
    bytes: [u8; KEY_SIZE],
}

impl DatabaseKey {
    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Creates a key from a byte slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self { bytes })
    }

    /// Generates a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parses a key from its hex representation.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        if text.len() != KEY_SIZE * 2 {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: text.len() / 2,
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Ok(Self { bytes })
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Lowercase hex encoding of the key, wiped when dropped.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.bytes))
    }

    /// The SQLCipher raw-key literal (`x'<HEX>'`) for `PRAGMA key` and
    /// `ATTACH ... KEY`, wiped when dropped.
    pub fn sqlcipher_literal(&self) -> Zeroizing<String> {
        let hex = Zeroizing::new(hex::encode_upper(self.bytes));
        Zeroizing::new(format!("x'{}'", hex.as_str()))
    }
}

impl std::fmt::Debug for DatabaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Compares two optional keys, treating `None` as "no encryption".
pub fn same_key(a: Option<&DatabaseKey>, b: Option<&DatabaseKey>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
