//! Client error types.

use crate::transport::TransportError;
use crate::upload::PreparedUpload;
use thiserror::Error;
use zerok_drop_core::{DownloadFailure, LinkError, UploadFailure};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// File larger than the upload limit. No cryptography was attempted.
    #[error("file too large: {size} bytes exceeds the {max} byte limit")]
    Oversize {
        /// Plaintext size.
        size: u64,
        /// Limit.
        max: u64,
    },

    /// The share link has no key fragment. No request was made.
    #[error("encryption key not found; use the full share link including the part after '#'")]
    KeyMissing,

    /// The key fragment is not a valid key. No request was made.
    #[error("invalid encryption key: {0}")]
    KeyDecode(String),

    /// Ciphertext failed authentication: wrong key or corrupted data.
    #[error("decryption failed: wrong key or corrupted file")]
    Authentication,

    /// The relay could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The share was consumed or has reached its download limit.
    #[error("file is no longer available: {0}")]
    Burned(String),

    /// Password missing or wrong.
    #[error("access denied: {0}")]
    Access(String),

    /// Unknown or expired share.
    #[error("file not found or expired: {0}")]
    NotFound(String),

    /// The relay refused the request.
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided description.
        message: String,
    },

    /// Upload options out of range.
    #[error("invalid upload options: {0}")]
    InvalidOptions(String),

    /// The share link could not be parsed.
    #[error(transparent)]
    InvalidLink(#[from] LinkError),

    /// Local cryptographic failure (entropy, sealing).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The relay answered with something we could not use.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(msg) => ClientError::Network(msg),
            TransportError::Timeout => ClientError::Network("request timeout".into()),
            TransportError::Access(msg) => ClientError::Access(msg),
            TransportError::Burned(msg) => ClientError::Burned(msg),
            TransportError::NotFound(msg) => ClientError::NotFound(msg),
            TransportError::Rejected { status, message } => {
                ClientError::Rejected { status, message }
            }
            TransportError::Malformed(msg) => ClientError::Malformed(msg),
        }
    }
}

impl ClientError {
    /// Whether retrying the same request could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub(crate) fn upload_failure(&self) -> UploadFailure {
        match self {
            ClientError::Oversize { size, max } => UploadFailure::Oversize {
                size: *size,
                max: *max,
            },
            ClientError::Network(_) => UploadFailure::Network,
            ClientError::Crypto(_) => UploadFailure::Encryption,
            _ => UploadFailure::Rejected,
        }
    }

    pub(crate) fn download_failure(&self) -> DownloadFailure {
        match self {
            ClientError::InvalidLink(_) => DownloadFailure::InvalidLink,
            ClientError::KeyMissing | ClientError::KeyDecode(_) => DownloadFailure::KeyDecode,
            ClientError::Authentication => DownloadFailure::Authentication,
            ClientError::Network(_) => DownloadFailure::Network,
            ClientError::Burned(_) => DownloadFailure::Burned,
            ClientError::Access(_) => DownloadFailure::Access,
            ClientError::NotFound(_) => DownloadFailure::NotFound,
            ClientError::Malformed(_) => DownloadFailure::Malformed,
            _ => DownloadFailure::Rejected,
        }
    }
}

/// A failed submission.
///
/// Network failures keep the prepared upload so the same ciphertext can be
/// resubmitted without generating a new key.
#[derive(Debug)]
pub struct SubmitError {
    error: ClientError,
    retry: Option<PreparedUpload>,
}

impl SubmitError {
    pub(crate) fn new(error: ClientError, retry: Option<PreparedUpload>) -> Self {
        Self { error, retry }
    }

    /// The underlying error.
    pub fn error(&self) -> &ClientError {
        &self.error
    }

    /// Whether [`into_retry`](Self::into_retry) will return the upload.
    pub fn is_retriable(&self) -> bool {
        self.retry.is_some()
    }

    /// Take back the prepared upload for another attempt.
    pub fn into_retry(self) -> Option<PreparedUpload> {
        self.retry
    }

    /// Discard the prepared upload and keep the error.
    pub fn into_error(self) -> ClientError {
        self.error
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SubmitError> for ClientError {
    fn from(e: SubmitError) -> Self {
        e.error
    }
}
