//! HTTP API bodies for 0k-Drop.
//!
//! All bodies are JSON with camelCase field names. Binary fields
//! (ciphertext, nonces) are standard base64 strings on the wire.
//!
//! ```text
//! POST /api/v1/upload                 UploadRequest   -> 201 UploadResponse
//! POST /api/v1/download/{shareId}     DownloadRequest -> 200 DownloadResponse
//! any non-2xx                                          -> ErrorBody
//! ```
//!
//! The password travels in the request body, never in the query string.

use crate::ids::ShareId;
use serde::{Deserialize, Serialize};

/// Path prefix for every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Upload route.
pub const UPLOAD_PATH: &str = "/api/v1/upload";

/// Expiration used when the uploader does not choose one (7 days).
pub const DEFAULT_EXPIRATION_MINUTES: u32 = 7 * 24 * 60;

/// Shortest accepted expiration.
pub const MIN_EXPIRATION_MINUTES: u32 = 1;

/// Longest accepted expiration (30 days).
pub const MAX_EXPIRATION_MINUTES: u32 = 30 * 24 * 60;

/// Download route for a share id.
pub fn download_path(share_id: &ShareId) -> String {
    format!("{}/download/{}", API_PREFIX, share_id)
}

fn default_expiration_minutes() -> u32 {
    DEFAULT_EXPIRATION_MINUTES
}

/// Base64 (standard alphabet, padded) codec for binary JSON fields.
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Opaque anti-abuse fields forwarded untouched.
///
/// These keep their snake_case names on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaFields {
    /// Challenge identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_id: Option<String>,
    /// Solution to the challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_solution: Option<String>,
    /// Token issued by a third-party challenge provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_token: Option<String>,
}

/// Body of `POST /api/v1/upload`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Chunked AEAD ciphertext of the file content.
    #[serde(with = "b64")]
    pub encrypted_data: Vec<u8>,
    /// AEAD ciphertext of the UTF-8 filename.
    #[serde(with = "b64")]
    pub encrypted_filename: Vec<u8>,
    /// Base nonce of the content stream (24 bytes).
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    /// Nonce of the filename ciphertext (24 bytes).
    #[serde(with = "b64")]
    pub filename_iv: Vec<u8>,
    /// Plaintext size in bytes.
    pub file_size: u64,
    /// Declared MIME type of the plaintext.
    pub mime_type: String,
    /// Minutes until the share expires.
    #[serde(default = "default_expiration_minutes")]
    pub expiration_minutes: u32,
    /// Access password, verified by the server (not part of the key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Maximum number of downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_limit: Option<u32>,
    /// Burn the share after the first successful download.
    #[serde(default)]
    pub one_time_download: bool,
    /// Anti-abuse passthrough.
    #[serde(flatten)]
    pub captcha: CaptchaFields,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field(
                "encrypted_data",
                &format!("[{} bytes]", self.encrypted_data.len()),
            )
            .field(
                "encrypted_filename",
                &format!("[{} bytes]", self.encrypted_filename.len()),
            )
            .field("file_size", &self.file_size)
            .field("mime_type", &self.mime_type)
            .field("expiration_minutes", &self.expiration_minutes)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("download_limit", &self.download_limit)
            .field("one_time_download", &self.one_time_download)
            .finish_non_exhaustive()
    }
}

/// Body of a successful upload response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Identifier to place in the share link path.
    pub share_id: ShareId,
    /// Unix timestamp (seconds) after which the share is gone.
    pub expires_at: u64,
}

/// Body of `POST /api/v1/download/{shareId}`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Access password for protected shares.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Body of a successful download response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    /// Chunked AEAD ciphertext of the file content.
    #[serde(with = "b64")]
    pub encrypted_data: Vec<u8>,
    /// Base nonce of the content stream.
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    /// AEAD ciphertext of the filename.
    #[serde(with = "b64")]
    pub filename: Vec<u8>,
    /// Nonce of the filename ciphertext.
    #[serde(with = "b64")]
    pub filename_iv: Vec<u8>,
    /// True when this download burned the share.
    pub one_time_download: bool,
    /// Declared MIME type of the plaintext.
    pub mime_type: String,
    /// Plaintext size in bytes.
    pub file_size: u64,
    /// Downloads left under a download limit, if one was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads_remaining: Option<u32>,
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field(
                "encrypted_data",
                &format!("[{} bytes]", self.encrypted_data.len()),
            )
            .field("one_time_download", &self.one_time_download)
            .field("mime_type", &self.mime_type)
            .field("file_size", &self.file_size)
            .field("downloads_remaining", &self.downloads_remaining)
            .finish_non_exhaustive()
    }
}

/// Error payload returned with any non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error summary.
    pub error: String,
    /// Optional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    /// Create an error body without details.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Attach details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Render as `"error: details"`, or just `error` without details.
    pub fn describe(&self) -> String {
        match &self.details {
            Some(details) => format!("{}: {}", self.error, details),
            None => self.error.clone(),
        }
    }
}
