//! Symmetric key management for 0k-Drop.
//!
//! One [`SymmetricKey`] is generated per upload. It never leaves the client
//! except inside the share link fragment, which browsers and the transports
//! in this workspace never send to a server.
//!
//! The key flow:
//! 1. Sender generates a key from the OS CSPRNG
//! 2. Key is imported into a [`CipherHandle`] to encrypt content and filename
//! 3. Key is encoded as 43 URL-safe base64 characters into the link fragment
//! 4. Receiver decodes the fragment back into the same 32 bytes

use crate::cipher::CipherHandle;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Key size for XChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Length of an encoded key (32 bytes = 43 base64 chars, no padding).
pub const ENCODED_KEY_LEN: usize = 43;

/// Key errors.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The OS random number generator failed. Fatal for the transfer.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// The link fragment is not a valid encoded key.
    #[error("invalid encryption key: {0}")]
    Decode(String),

    /// Raw key material has the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    Import {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Subkey derivation failed.
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// A 256-bit symmetric key for one file transfer.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a new random key from the OS CSPRNG.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| KeyError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Encode for the share link fragment.
    ///
    /// URL-safe base64 without padding: only `[A-Za-z0-9_-]`, so the result
    /// never needs percent-encoding.
    pub fn encode_for_sharing(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Decode a key from a share link fragment.
    ///
    /// Rejects standard-alphabet characters (`+`, `/`), padding, and any
    /// input that does not decode to exactly 32 bytes.
    pub fn decode_from_sharing(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        let decoded = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.as_bytes())
                .map_err(|e| KeyError::Decode(e.to_string()))?,
        );

        if decoded.len() != KEY_SIZE {
            return Err(KeyError::Decode(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Prepare this key for AEAD use.
    pub fn cipher(&self) -> Result<CipherHandle, KeyError> {
        CipherHandle::derive(&self.0)
    }
}

// Intentionally opaque debug to avoid logging secrets
impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Import raw key material into a cipher handle.
pub fn import(raw: &[u8]) -> Result<CipherHandle, KeyError> {
    if raw.len() != KEY_SIZE {
        return Err(KeyError::Import {
            expected: KEY_SIZE,
            actual: raw.len(),
        });
    }
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(raw);
    SymmetricKey::from_bytes(bytes).cipher()
}
