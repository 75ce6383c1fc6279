//! Error types for 0k-Drop wire types.

use thiserror::Error;

/// Errors that can occur when building or validating wire types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Share id is empty, too long, or contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid share id: {0}")]
    InvalidShareId(String),

    /// The OS random number generator failed
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}
