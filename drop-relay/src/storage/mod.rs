//! Storage layer for drop-relay.
//!
//! Holds encrypted payloads and their access policy. The relay cannot
//! decrypt anything it stores.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use zerok_drop_types::ShareId;

/// Current unix time in seconds.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Request to store a new share.
#[derive(Clone)]
pub struct NewShare {
    /// Server-generated share id.
    pub share_id: ShareId,
    /// Content ciphertext.
    pub encrypted_data: Vec<u8>,
    /// Filename ciphertext.
    pub encrypted_filename: Vec<u8>,
    /// Content stream base nonce.
    pub iv: Vec<u8>,
    /// Filename nonce.
    pub filename_iv: Vec<u8>,
    /// Plaintext size reported by the client.
    pub file_size: u64,
    /// MIME type reported by the client.
    pub mime_type: String,
    /// Argon2id PHC string, if the share is password protected.
    pub password_hash: Option<String>,
    /// Maximum downloads, if limited.
    pub download_limit: Option<u32>,
    /// Burn after the first download.
    pub one_time_download: bool,
    /// Unix timestamp when the share was created.
    pub created_at: i64,
    /// Unix timestamp when the share expires.
    pub expires_at: i64,
}

impl std::fmt::Debug for NewShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewShare")
            .field("share_id", &self.share_id)
            .field("encrypted_data", &format!("[{} bytes]", self.encrypted_data.len()))
            .field("file_size", &self.file_size)
            .field("password_protected", &self.password_hash.is_some())
            .field("download_limit", &self.download_limit)
            .field("one_time_download", &self.one_time_download)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Share metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    /// Share id.
    pub share_id: ShareId,
    /// Plaintext size reported by the client.
    pub file_size: u64,
    /// MIME type reported by the client.
    pub mime_type: String,
    /// Argon2id PHC string, if password protected.
    pub password_hash: Option<String>,
    /// Maximum downloads, if limited.
    pub download_limit: Option<u32>,
    /// Completed downloads.
    pub download_count: u32,
    /// Burn after the first download.
    pub one_time_download: bool,
    /// The payload has been erased.
    pub burned: bool,
    /// Unix timestamp when the share was created.
    pub created_at: i64,
    /// Unix timestamp when the share expires.
    pub expires_at: i64,
}

impl ShareRecord {
    /// Check if the share has passed its expiry at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// A successfully claimed download.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimedShare {
    /// Content ciphertext.
    pub encrypted_data: Vec<u8>,
    /// Filename ciphertext.
    pub encrypted_filename: Vec<u8>,
    /// Content stream base nonce.
    pub iv: Vec<u8>,
    /// Filename nonce.
    pub filename_iv: Vec<u8>,
    /// Plaintext size reported by the uploader.
    pub file_size: u64,
    /// MIME type reported by the uploader.
    pub mime_type: String,
    /// The share was one-time.
    pub one_time_download: bool,
    /// Downloads left after this one, if limited.
    pub downloads_remaining: Option<u32>,
    /// This download burned the share.
    pub burned: bool,
}

impl std::fmt::Debug for ClaimedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedShare")
            .field("encrypted_data", &format!("[{} bytes]", self.encrypted_data.len()))
            .field("downloads_remaining", &self.downloads_remaining)
            .field("burned", &self.burned)
            .finish()
    }
}

/// Outcome of a download claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The download was counted and the payload released.
    Granted(ClaimedShare),
    /// Unknown or expired.
    NotFound,
    /// Already consumed or out of downloads.
    Burned,
}

/// Trait for share storage backends.
#[async_trait]
pub trait ShareStorage: Send + Sync {
    /// Store a new share.
    ///
    /// Fails with [`StorageError::Duplicate`] if the id is taken.
    async fn insert_share(&self, share: &NewShare) -> Result<(), StorageError>;

    /// Get share metadata, payload excluded.
    async fn get_share(&self, share_id: &ShareId) -> Result<Option<ShareRecord>, StorageError>;

    /// Atomically count one download and release the payload.
    ///
    /// When this download exhausts the share (one-time, or the limit is
    /// reached) the share is marked burned and its payload erased in the
    /// same transaction.
    async fn claim_download(&self, share_id: &ShareId, now: i64) -> Result<Claim, StorageError>;

    /// Remove expired and burned shares.
    ///
    /// Returns the number of shares deleted.
    async fn cleanup(&self, now: i64) -> Result<u64, StorageError>;

    /// Number of live (unexpired, unburned) shares.
    async fn share_count(&self, now: i64) -> Result<u64, StorageError>;

    /// Total ciphertext bytes held.
    async fn stored_bytes(&self) -> Result<u64, StorageError>;
}
