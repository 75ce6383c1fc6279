//! Error types for drop-relay.

use std::path::PathBuf;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A share id is already taken.
    #[error("share id already exists: {share_id}")]
    Duplicate {
        /// The colliding share id.
        share_id: String,
    },

    /// A stored row could not be converted.
    #[error("corrupt row for share {share_id}: {reason}")]
    Corrupt {
        /// The share id of the row.
        share_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Password hashing errors.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// No randomness for the salt.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Hashing failed.
    #[error("hashing failed: {0}")]
    Hash(String),

    /// The stored hash is not a valid PHC string.
    #[error("stored hash is invalid: {0}")]
    InvalidHash(String),
}

