//! Mock transport for testing.
//!
//! Emulates the relay in memory: password gate, one-time burn, download
//! limits, and expiry. Captures every request for verification.

use super::{Transport, TransportError};
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zerok_drop_types::{DownloadResponse, ShareId, UploadRequest, UploadResponse};

/// Mock transport for testing.
///
/// Clones share state, so a test can hand one clone to an uploader and
/// another to a downloader.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    shares: HashMap<ShareId, MockShare>,
    uploads: Vec<UploadRequest>,
    downloads: Vec<ShareId>,
    fail_next_upload: Option<TransportError>,
    fail_next_download: Option<TransportError>,
}

#[derive(Debug)]
struct MockShare {
    request: UploadRequest,
    download_count: u32,
    burned: bool,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all upload requests that were received.
    pub fn uploads(&self) -> Vec<UploadRequest> {
        let inner = self.inner.lock().unwrap();
        inner.uploads.clone()
    }

    /// Get the last upload request.
    pub fn last_upload(&self) -> Option<UploadRequest> {
        let inner = self.inner.lock().unwrap();
        inner.uploads.last().cloned()
    }

    /// Number of download requests received, successful or not.
    pub fn download_requests(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.downloads.len()
    }

    /// Check whether the relay still holds a payload for `share_id`.
    pub fn is_stored(&self, share_id: &ShareId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .shares
            .get(share_id)
            .map(|share| !share.burned)
            .unwrap_or(false)
    }

    /// Flip one byte of the stored content ciphertext.
    pub fn corrupt_content(&self, share_id: &ShareId, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(share) = inner.shares.get_mut(share_id) {
            if let Some(byte) = share.request.encrypted_data.get_mut(index) {
                *byte ^= 0x01;
            }
        }
    }

    /// Flip one byte of the stored filename ciphertext.
    pub fn corrupt_filename(&self, share_id: &ShareId, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(share) = inner.shares.get_mut(share_id) {
            if let Some(byte) = share.request.encrypted_filename.get_mut(index) {
                *byte ^= 0x01;
            }
        }
    }

    /// Drop a share as if it had expired.
    pub fn expire(&self, share_id: &ShareId) {
        let mut inner = self.inner.lock().unwrap();
        inner.shares.remove(share_id);
    }

    /// Cause the next upload() to fail with the given error.
    pub fn fail_next_upload(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_upload = Some(error);
    }

    /// Cause the next download() to fail with the given error.
    pub fn fail_next_download(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_download = Some(error);
    }

    /// Clear all state (shares, captured requests, injected failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn upload(
        &self,
        request: &UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.uploads.push(request.clone());

        if let Some(error) = inner.fail_next_upload.take() {
            return Err(error);
        }

        let share_id =
            ShareId::generate().map_err(|e| TransportError::Network(e.to_string()))?;
        inner.shares.insert(
            share_id.clone(),
            MockShare {
                request: request.clone(),
                download_count: 0,
                burned: false,
            },
        );

        let total = request.encrypted_data.len() as u64;
        progress.report(total, total);

        Ok(UploadResponse {
            share_id,
            expires_at: u64::from(request.expiration_minutes) * 60,
        })
    }

    async fn download(
        &self,
        share_id: &ShareId,
        password: Option<&str>,
    ) -> Result<DownloadResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.downloads.push(share_id.clone());

        if let Some(error) = inner.fail_next_download.take() {
            return Err(error);
        }

        let share = inner
            .shares
            .get_mut(share_id)
            .ok_or_else(|| TransportError::NotFound("File not found or expired".into()))?;

        if share.burned {
            return Err(TransportError::Burned("File has already been downloaded".into()));
        }

        if let Some(expected) = share.request.password.as_deref() {
            match password {
                None => return Err(TransportError::Access("Password required".into())),
                Some(given) if given != expected => {
                    return Err(TransportError::Access("Incorrect password".into()))
                }
                Some(_) => {}
            }
        }

        share.download_count += 1;
        let downloads_remaining = share
            .request
            .download_limit
            .map(|limit| limit.saturating_sub(share.download_count));
        if share.request.one_time_download || downloads_remaining == Some(0) {
            share.burned = true;
        }

        Ok(DownloadResponse {
            encrypted_data: share.request.encrypted_data.clone(),
            iv: share.request.iv.clone(),
            filename: share.request.encrypted_filename.clone(),
            filename_iv: share.request.filename_iv.clone(),
            one_time_download: share.request.one_time_download,
            mime_type: share.request.mime_type.clone(),
            file_size: share.request.file_size,
            downloads_remaining,
        })
    }
}
