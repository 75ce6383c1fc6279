//! Authenticated encryption for 0k-Drop.
//!
//! This module provides:
//! - XChaCha20-Poly1305 with random 192-bit nonces
//! - Separate HKDF-SHA256 subkeys for file content and filename
//! - A chunked AEAD stream for content, so arbitrarily large files are
//!   processed in a fixed-size working buffer
//!
//! # Content stream format
//!
//! ```text
//! plaintext:  [   64 KiB   ][   64 KiB   ][ 0..=64 KiB ]
//! ciphertext: [ chunk | tag][ chunk | tag][ chunk | tag]
//!               index 0       index 1       index 2, final
//!
//! chunk nonce = base nonce with last 8 bytes XOR index (u64 BE)
//! chunk aad   = index (u64 BE) || final flag (1 byte)
//! ```
//!
//! Every stream ends with exactly one chunk marked final, so truncation,
//! reordering, and appended chunks all fail authentication. An empty file
//! is a single empty final chunk (16 bytes of ciphertext).
//!
//! # Security Notes
//!
//! - Content and filename never share a subkey, and each gets its own random nonce
//! - Nonces are generated here; callers cannot choose them
//! - Decryption either yields the exact plaintext or fails with
//!   [`CipherError::Authentication`]

use crate::keys::{KeyError, KEY_SIZE};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Plaintext bytes per content chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

const SEALED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_SIZE;

const HKDF_SALT: &[u8] = b"0k-drop-v1";
const CONTENT_INFO: &[u8] = b"content";
const FILENAME_INFO: &[u8] = b"filename";

/// Cipher errors.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Tag verification failed: wrong key, tampered data, or a truncated stream.
    #[error("decryption failed: authentication error")]
    Authentication,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The OS random number generator failed.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Nonce has the wrong length.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonce {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Filename decrypted but is not UTF-8.
    #[error("decrypted filename is not valid UTF-8")]
    InvalidFilename,

    /// Stream exceeded the chunk counter.
    #[error("content stream too long")]
    StreamTooLong,
}

/// A 192-bit XChaCha20-Poly1305 nonce.
///
/// Nonces are public and travel next to the ciphertext.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn random() -> Result<Self, CipherError> {
        let mut bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| CipherError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice received off the wire.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let arr: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| CipherError::InvalidNonce {
            expected: NONCE_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Nonce for chunk `index` of a content stream.
    fn for_chunk(&self, index: u64) -> Self {
        let mut bytes = self.0;
        for (b, i) in bytes[NONCE_SIZE - 8..].iter_mut().zip(index.to_be_bytes()) {
            *b ^= i;
        }
        Self(bytes)
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", URL_SAFE_NO_PAD.encode(self.0))
    }
}

/// Ciphertext plus the nonce it was sealed under.
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed {
    /// AEAD output (tags included).
    pub ciphertext: Vec<u8>,
    /// Nonce (content: stream base nonce).
    pub nonce: Nonce,
}

impl std::fmt::Debug for Sealed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealed")
            .field("ciphertext", &format!("[{} bytes]", self.ciphertext.len()))
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Ciphertext length of a content stream for `plaintext_len` bytes.
pub fn sealed_len(plaintext_len: u64) -> u64 {
    let chunk = CHUNK_SIZE as u64;
    let chunks = if plaintext_len == 0 {
        1
    } else {
        plaintext_len.div_ceil(chunk)
    };
    plaintext_len + chunks * TAG_SIZE as u64
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Subkey([u8; KEY_SIZE]);

impl Subkey {
    fn aead(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

/// An imported key, ready for encryption.
///
/// Holds two subkeys derived from the transfer key via HKDF-SHA256,
/// one for content and one for the filename.
pub struct CipherHandle {
    content: Subkey,
    filename: Subkey,
}

impl CipherHandle {
    pub(crate) fn derive(key: &[u8; KEY_SIZE]) -> Result<Self, KeyError> {
        let hkdf = Hkdf::<Sha256>::new(Some(HKDF_SALT), key);

        let mut content = Subkey([0u8; KEY_SIZE]);
        let mut filename = Subkey([0u8; KEY_SIZE]);

        hkdf.expand(CONTENT_INFO, &mut content.0)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        hkdf.expand(FILENAME_INFO, &mut filename.0)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;

        Ok(Self { content, filename })
    }

    /// Encrypt a filename under the filename subkey with a fresh nonce.
    pub fn encrypt_filename(&self, name: &str) -> Result<Sealed, CipherError> {
        let nonce = Nonce::random()?;
        let ciphertext = self
            .filename
            .aead()
            .encrypt(XNonce::from_slice(nonce.as_bytes()), name.as_bytes())
            .map_err(|_| CipherError::Encryption("aead encrypt failed".into()))?;
        Ok(Sealed { ciphertext, nonce })
    }

    /// Decrypt a filename.
    pub fn decrypt_filename(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<String, CipherError> {
        let plaintext = self
            .filename
            .aead()
            .decrypt(XNonce::from_slice(nonce.as_bytes()), ciphertext)
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidFilename)
    }

    /// Start a content stream with a fresh base nonce.
    pub fn content_sealer(&self) -> Result<ContentSealer, CipherError> {
        Ok(ContentSealer {
            aead: self.content.aead(),
            base: Nonce::random()?,
            index: 0,
            buffer: Zeroizing::new(Vec::with_capacity(CHUNK_SIZE)),
        })
    }

    /// Open a content stream sealed under `nonce`.
    pub fn content_opener(&self, nonce: &Nonce) -> ContentOpener {
        ContentOpener {
            aead: self.content.aead(),
            base: *nonce,
            index: 0,
            buffer: Vec::with_capacity(SEALED_CHUNK_SIZE),
        }
    }

    /// Encrypt a whole file into a single content stream.
    pub fn encrypt_content(&self, plaintext: &[u8]) -> Result<Sealed, CipherError> {
        let mut sealer = self.content_sealer()?;
        let nonce = sealer.nonce();

        let mut ciphertext = Vec::with_capacity(sealed_len(plaintext.len() as u64) as usize);
        ciphertext.extend(sealer.update(plaintext)?);
        ciphertext.extend(sealer.finalize()?);

        Ok(Sealed { ciphertext, nonce })
    }

    /// Decrypt a whole content stream.
    ///
    /// All or nothing: on failure no plaintext is returned and the partial
    /// output is zeroized.
    pub fn decrypt_content(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CipherError> {
        let mut opener = self.content_opener(nonce);
        let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext.len()));

        plaintext.extend(opener.update(ciphertext)?);
        plaintext.extend(opener.finalize()?);

        Ok(std::mem::take(&mut *plaintext))
    }
}

impl std::fmt::Debug for CipherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CipherHandle {{ content_key: [REDACTED], filename_key: [REDACTED] }}"
        )
    }
}

fn chunk_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(last);
    aad
}

/// Incremental content encryptor.
///
/// Feed plaintext with [`update`](Self::update), then call
/// [`finalize`](Self::finalize) exactly once. Non-final chunks are emitted
/// only once more plaintext is known to follow.
pub struct ContentSealer {
    aead: XChaCha20Poly1305,
    base: Nonce,
    index: u64,
    buffer: Zeroizing<Vec<u8>>,
}

impl ContentSealer {
    /// Base nonce of this stream (sent to the server as `iv`).
    pub fn nonce(&self) -> Nonce {
        self.base
    }

    /// Absorb plaintext, returning any chunks that are now complete.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.buffer.extend_from_slice(data);

        let mut out = Vec::new();
        while self.buffer.len() > CHUNK_SIZE {
            let chunk = Zeroizing::new(self.buffer.drain(..CHUNK_SIZE).collect::<Vec<u8>>());
            out.extend(self.seal_chunk(&chunk, false)?);
        }
        Ok(out)
    }

    /// Seal the remaining plaintext as the final chunk.
    pub fn finalize(mut self) -> Result<Vec<u8>, CipherError> {
        let last = Zeroizing::new(std::mem::take(&mut *self.buffer));
        self.seal_chunk(&last, true)
    }

    fn seal_chunk(&mut self, chunk: &[u8], last: bool) -> Result<Vec<u8>, CipherError> {
        let nonce = self.base.for_chunk(self.index);
        let aad = chunk_aad(self.index, last);

        let sealed = self
            .aead
            .encrypt(
                XNonce::from_slice(nonce.as_bytes()),
                Payload { msg: chunk, aad: &aad },
            )
            .map_err(|_| CipherError::Encryption("aead encrypt failed".into()))?;

        self.index = self.index.checked_add(1).ok_or(CipherError::StreamTooLong)?;
        Ok(sealed)
    }
}

impl std::fmt::Debug for ContentSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSealer")
            .field("nonce", &self.base)
            .field("index", &self.index)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Incremental content decryptor.
///
/// Output from [`update`](Self::update) is authenticated chunk by chunk, but
/// the stream as a whole is only proven complete when
/// [`finalize`](Self::finalize) succeeds. Callers that must not release
/// partial plaintext hold it until then, as
/// [`CipherHandle::decrypt_content`] does.
pub struct ContentOpener {
    aead: XChaCha20Poly1305,
    base: Nonce,
    index: u64,
    buffer: Vec<u8>,
}

impl ContentOpener {
    /// Absorb ciphertext, returning plaintext of complete non-final chunks.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.buffer.extend_from_slice(data);

        let mut out = Vec::new();
        while self.buffer.len() > SEALED_CHUNK_SIZE {
            let chunk: Vec<u8> = self.buffer.drain(..SEALED_CHUNK_SIZE).collect();
            out.extend(self.open_chunk(&chunk, false)?);
        }
        Ok(out)
    }

    /// Open the final chunk.
    pub fn finalize(mut self) -> Result<Vec<u8>, CipherError> {
        if self.buffer.len() < TAG_SIZE {
            return Err(CipherError::Authentication);
        }
        let last = std::mem::take(&mut self.buffer);
        self.open_chunk(&last, true)
    }

    fn open_chunk(&mut self, chunk: &[u8], last: bool) -> Result<Vec<u8>, CipherError> {
        let nonce = self.base.for_chunk(self.index);
        let aad = chunk_aad(self.index, last);

        let opened = self
            .aead
            .decrypt(
                XNonce::from_slice(nonce.as_bytes()),
                Payload { msg: chunk, aad: &aad },
            )
            .map_err(|_| CipherError::Authentication)?;

        self.index = self.index.checked_add(1).ok_or(CipherError::StreamTooLong)?;
        Ok(opened)
    }
}

impl std::fmt::Debug for ContentOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentOpener")
            .field("nonce", &self.base)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
