//! Transport abstraction for 0k-Drop.
//!
//! This module provides a pluggable transport layer that abstracts
//! how ciphertext reaches the relay (HTTP, mock for testing).
//!
//! # Design
//!
//! The transport trait is request/response:
//! - `upload()` stores an encrypted payload and returns its share id
//! - `download()` fetches an encrypted payload by share id
//!
//! A transport never receives key material. The only link component it is
//! handed is the share id.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let response = transport.upload(&request, &ProgressReporter::disabled()).await?;
//! let payload = transport.download(&response.share_id, None).await?;
//! ```

mod http;
mod mock;

pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;

use crate::progress::ProgressReporter;
use async_trait::async_trait;
use thiserror::Error;
use zerok_drop_types::{DownloadResponse, ShareId, UploadRequest, UploadResponse};

/// Transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timeout")]
    Timeout,

    /// Password missing or wrong (401/403).
    #[error("access denied: {0}")]
    Access(String),

    /// Share consumed or over its download limit (410).
    #[error("share no longer available: {0}")]
    Burned(String),

    /// Unknown or expired share (404).
    #[error("share not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("server rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided description.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Access(message),
            404 => Self::NotFound(message),
            410 => Self::Burned(message),
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether the failure happened before the server answered.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// Transport trait for moving encrypted payloads to and from the relay.
///
/// Implementations handle the underlying mechanism (HTTP, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Store an encrypted payload.
    ///
    /// Progress is reported against the serialized request size.
    async fn upload(
        &self,
        request: &UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResponse, TransportError>;

    /// Fetch an encrypted payload.
    ///
    /// A successful call may consume the share on the server.
    async fn download(
        &self,
        share_id: &ShareId,
        password: Option<&str>,
    ) -> Result<DownloadResponse, TransportError>;
}
