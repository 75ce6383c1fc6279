//! Download flow: parse link, decode key, fetch, decrypt.
//!
//! The key is decoded before any request is made. A link without a key, or
//! with a malformed one, fails locally and never consumes a one-time share.

use crate::error::ClientError;
use crate::transport::Transport;
use std::collections::HashSet;
use std::sync::Mutex;
use zerok_drop_core::{
    link, CipherError, DownloadAction, DownloadEvent, DownloadState, Nonce, SymmetricKey,
};
use zerok_drop_types::ShareId;

/// A decrypted file.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Original filename as chosen by the uploader. Not sanitized.
    pub filename: String,
    /// MIME type reported by the relay.
    pub mime_type: String,
    /// Plaintext content.
    pub bytes: Vec<u8>,
    /// The share was consumed by this download.
    pub burned: bool,
    /// Downloads left, if the share has a limit.
    pub downloads_remaining: Option<u32>,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("filename", &"[REDACTED]")
            .field("mime_type", &self.mime_type)
            .field("bytes", &format!("[{} bytes]", self.bytes.len()))
            .field("burned", &self.burned)
            .field("downloads_remaining", &self.downloads_remaining)
            .finish()
    }
}

/// Fetches and decrypts shares through a [`Transport`].
///
/// Remembers shares it has seen burned so repeat attempts fail without a
/// request.
#[derive(Debug)]
pub struct Downloader<T: Transport> {
    transport: T,
    burned: Mutex<HashSet<ShareId>>,
}

impl<T: Transport> Downloader<T> {
    /// Create a new downloader.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            burned: Mutex::new(HashSet::new()),
        }
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check if a share is known to be burned.
    pub fn is_burned(&self, share_id: &ShareId) -> bool {
        self.burned
            .lock()
            .map(|set| set.contains(share_id))
            .unwrap_or(false)
    }

    /// Download the share a full link points at.
    ///
    /// Fails with [`ClientError::KeyMissing`] when the link has no fragment;
    /// use [`download_with_key`](Self::download_with_key) once the key has
    /// been obtained another way.
    pub async fn download(
        &self,
        url: &str,
        password: Option<&str>,
    ) -> Result<DownloadedFile, ClientError> {
        let state = DownloadState::new();

        let parsed = match link::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                let error = ClientError::from(e);
                self.fail(state, &error, None);
                return Err(error);
            }
        };

        let state = self.step(
            state,
            DownloadEvent::LinkParsed {
                has_key: parsed.encoded_key.is_some(),
            },
            &parsed.share_id,
        );

        match parsed.encoded_key {
            Some(encoded_key) => {
                self.run(state, &parsed.share_id, &encoded_key, password)
                    .await
            }
            None => Err(ClientError::KeyMissing),
        }
    }

    /// Download a share with a key supplied separately from the link.
    pub async fn download_with_key(
        &self,
        share_id: &ShareId,
        encoded_key: &str,
        password: Option<&str>,
    ) -> Result<DownloadedFile, ClientError> {
        let state = self.step(DownloadState::new(), DownloadEvent::KeyProvided, share_id);
        self.run(state, share_id, encoded_key, password).await
    }

    async fn run(
        &self,
        state: DownloadState,
        share_id: &ShareId,
        encoded_key: &str,
        password: Option<&str>,
    ) -> Result<DownloadedFile, ClientError> {
        let key = match SymmetricKey::decode_from_sharing(encoded_key) {
            Ok(key) => key,
            Err(e) => {
                let error = ClientError::KeyDecode(e.to_string());
                self.fail(state, &error, Some(share_id));
                return Err(error);
            }
        };
        let cipher = match key.cipher() {
            Ok(cipher) => cipher,
            Err(e) => {
                let error = ClientError::KeyDecode(e.to_string());
                self.fail(state, &error, Some(share_id));
                return Err(error);
            }
        };
        let state = self.step(state, DownloadEvent::KeyDecoded, share_id);

        if self.is_burned(share_id) {
            let error = ClientError::Burned("file has already been downloaded".into());
            self.fail(state, &error, Some(share_id));
            return Err(error);
        }

        let password = password.filter(|p| !p.is_empty());
        let response = match self.transport.download(share_id, password).await {
            Ok(response) => response,
            Err(e) => {
                let error = ClientError::from(e);
                tracing::debug!("Fetch of share {} failed: {}", share_id, error);
                self.fail(state, &error, Some(share_id));
                return Err(error);
            }
        };
        let state = self.step(state, DownloadEvent::Fetched, share_id);

        let opened = Nonce::from_slice(&response.iv)
            .and_then(|nonce| cipher.decrypt_content(&response.encrypted_data, &nonce));
        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = open_error(e);
                self.fail(state, &error, Some(share_id));
                return Err(error);
            }
        };
        let state = self.step(state, DownloadEvent::ContentDecrypted, share_id);

        let named = Nonce::from_slice(&response.filename_iv)
            .and_then(|nonce| cipher.decrypt_filename(&response.filename, &nonce));
        let filename = match named {
            Ok(filename) => filename,
            Err(e) => {
                let error = open_error(e);
                self.fail(state, &error, Some(share_id));
                return Err(error);
            }
        };

        let burned = response.one_time_download || response.downloads_remaining == Some(0);
        self.step(state, DownloadEvent::FilenameDecrypted { burned }, share_id);

        Ok(DownloadedFile {
            filename,
            mime_type: response.mime_type,
            bytes,
            burned,
            downloads_remaining: response.downloads_remaining,
        })
    }

    /// Advance the machine and carry out bookkeeping actions.
    fn step(&self, state: DownloadState, event: DownloadEvent, share_id: &ShareId) -> DownloadState {
        let (next, actions) = state.on_event(event);
        tracing::debug!("Download state: {:?} (next: {:?})", next, actions);

        if actions.contains(&DownloadAction::MarkBurned) {
            if let Ok(mut set) = self.burned.lock() {
                set.insert(share_id.clone());
            }
        }
        next
    }

    fn fail(&self, state: DownloadState, error: &ClientError, share_id: Option<&ShareId>) {
        let event = DownloadEvent::Failed(error.download_failure());
        match share_id {
            Some(share_id) => {
                self.step(state, event, share_id);
            }
            None => {
                let (next, _) = state.on_event(event);
                tracing::debug!("Download state: {:?}", next);
            }
        }
    }
}

/// Map a decryption failure. A malformed nonce is the relay's fault; any
/// other failure is indistinguishable from a wrong key.
fn open_error(e: CipherError) -> ClientError {
    match e {
        CipherError::InvalidNonce { .. } => ClientError::Malformed(e.to_string()),
        _ => ClientError::Authentication,
    }
}
