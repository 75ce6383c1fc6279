//! Upload flow: encrypt locally, submit ciphertext, build the share link.
//!
//! The flow is split in two so a network failure does not cost a new key:
//! [`Uploader::prepare`] does all the cryptography and yields a
//! [`PreparedUpload`]; [`Uploader::submit`] sends it and can be repeated
//! with the same prepared upload.

use crate::error::{ClientError, SubmitError};
use crate::progress::ProgressReporter;
use crate::transport::Transport;
use zeroize::{Zeroize, ZeroizeOnDrop};
use zerok_drop_core::{
    ShareLink, SymmetricKey, UploadEvent, UploadState, MAX_FILE_SIZE,
};
use zerok_drop_types::{
    CaptchaFields, UploadRequest, DEFAULT_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES,
    MIN_EXPIRATION_MINUTES,
};

/// MIME type used when the caller does not know better.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file to upload. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PlainFile {
    /// Original filename. Encrypted before it leaves the client.
    pub name: String,
    /// MIME type. Sent in the clear.
    pub mime_type: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl PlainFile {
    /// A file with the default MIME type.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            bytes,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Plaintext size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for PlainFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainFile")
            .field("name", &"[REDACTED]")
            .field("mime_type", &self.mime_type)
            .field("bytes", &format!("[{} bytes]", self.bytes.len()))
            .finish()
    }
}

/// Server-side policy attached to an upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadOptions {
    expiration_minutes: u32,
    password: Option<String>,
    download_limit: Option<u32>,
    one_time: bool,
    captcha: CaptchaFields,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            expiration_minutes: DEFAULT_EXPIRATION_MINUTES,
            password: None,
            download_limit: None,
            one_time: false,
            captcha: CaptchaFields::default(),
        }
    }
}

impl UploadOptions {
    /// Default options: seven-day expiry, no password, unlimited downloads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lifetime in minutes.
    pub fn with_expiration_minutes(mut self, minutes: u32) -> Self {
        self.expiration_minutes = minutes;
        self
    }

    /// Require a password to download. An empty password means none.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = if password.is_empty() {
            None
        } else {
            Some(password)
        };
        self
    }

    /// Allow at most `limit` downloads.
    pub fn with_download_limit(mut self, limit: u32) -> Self {
        self.download_limit = Some(limit);
        self
    }

    /// Burn the share after its first download.
    pub fn with_one_time(mut self, one_time: bool) -> Self {
        self.one_time = one_time;
        self
    }

    /// Attach anti-abuse fields, forwarded untouched.
    pub fn with_captcha(mut self, captcha: CaptchaFields) -> Self {
        self.captcha = captcha;
        self
    }

    /// Lifetime in minutes.
    pub fn expiration_minutes(&self) -> u32 {
        self.expiration_minutes
    }

    /// Download password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Download limit, if any.
    pub fn download_limit(&self) -> Option<u32> {
        self.download_limit
    }

    /// Whether the share burns after one download.
    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    /// Check the options are within the relay's accepted ranges.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !(MIN_EXPIRATION_MINUTES..=MAX_EXPIRATION_MINUTES).contains(&self.expiration_minutes) {
            return Err(ClientError::InvalidOptions(format!(
                "expiration must be between {} and {} minutes, got {}",
                MIN_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES, self.expiration_minutes
            )));
        }
        if self.download_limit == Some(0) {
            return Err(ClientError::InvalidOptions(
                "download limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("expiration_minutes", &self.expiration_minutes)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("download_limit", &self.download_limit)
            .field("one_time", &self.one_time)
            .finish()
    }
}

/// Ciphertext and key, ready to submit.
#[derive(Debug)]
pub struct PreparedUpload {
    state: UploadState,
    key: SymmetricKey,
    request: UploadRequest,
}

impl PreparedUpload {
    /// The request that will be sent. Contains no key material.
    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    /// Current position in the upload state machine.
    pub fn state(&self) -> &UploadState {
        &self.state
    }
}

fn advance(state: UploadState, event: UploadEvent) -> UploadState {
    let (next, actions) = state.on_event(event);
    tracing::debug!("Upload state: {:?} (next: {:?})", next, actions);
    next
}

fn fail(state: UploadState, error: ClientError) -> ClientError {
    advance(state, UploadEvent::Failed(error.upload_failure()));
    error
}

/// Encrypts files and submits them through a [`Transport`].
#[derive(Debug)]
pub struct Uploader<T: Transport> {
    transport: T,
    origin: String,
    max_size: u64,
}

impl<T: Transport> Uploader<T> {
    /// Create an uploader whose links point at `origin`.
    pub fn new(transport: T, origin: impl Into<String>) -> Self {
        Self {
            transport,
            origin: origin.into(),
            max_size: MAX_FILE_SIZE,
        }
    }

    /// Lower (or raise) the plaintext size limit.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// The plaintext size limit.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encrypt `file` under a fresh key.
    ///
    /// Oversize files are refused before any key is generated.
    pub fn prepare(
        &self,
        file: &PlainFile,
        options: &UploadOptions,
    ) -> Result<PreparedUpload, ClientError> {
        options.validate()?;
        if file.name.is_empty() {
            return Err(ClientError::InvalidOptions("filename must not be empty".into()));
        }

        let state = advance(
            UploadState::new(),
            UploadEvent::PlaintextSelected {
                size: file.size(),
                max: self.max_size,
            },
        );
        if state.is_terminal() {
            return Err(ClientError::Oversize {
                size: file.size(),
                max: self.max_size,
            });
        }

        let key = match SymmetricKey::generate() {
            Ok(key) => key,
            Err(e) => return Err(fail(state, ClientError::Crypto(e.to_string()))),
        };
        let cipher = match key.cipher() {
            Ok(cipher) => cipher,
            Err(e) => return Err(fail(state, ClientError::Crypto(e.to_string()))),
        };
        let state = advance(state, UploadEvent::KeyGenerated);

        let content = match cipher.encrypt_content(&file.bytes) {
            Ok(sealed) => sealed,
            Err(e) => return Err(fail(state, ClientError::Crypto(e.to_string()))),
        };
        let state = advance(state, UploadEvent::ContentEncrypted);

        let filename = match cipher.encrypt_filename(&file.name) {
            Ok(sealed) => sealed,
            Err(e) => return Err(fail(state, ClientError::Crypto(e.to_string()))),
        };
        let state = advance(state, UploadEvent::FilenameEncrypted);

        let request = UploadRequest {
            encrypted_data: content.ciphertext,
            encrypted_filename: filename.ciphertext,
            iv: content.nonce.as_bytes().to_vec(),
            filename_iv: filename.nonce.as_bytes().to_vec(),
            file_size: file.size(),
            mime_type: file.mime_type.clone(),
            expiration_minutes: options.expiration_minutes,
            password: options.password.clone(),
            download_limit: options.download_limit,
            one_time_download: options.one_time,
            captcha: options.captcha.clone(),
        };

        Ok(PreparedUpload {
            state,
            key,
            request,
        })
    }

    /// Send a prepared upload and build its share link.
    ///
    /// On a network failure the returned error hands the prepared upload
    /// back through [`SubmitError::into_retry`].
    pub async fn submit(
        &self,
        prepared: PreparedUpload,
        progress: &ProgressReporter,
    ) -> Result<ShareLink, SubmitError> {
        let PreparedUpload {
            state,
            key,
            request,
        } = prepared;

        // A prepared upload coming back from a failed attempt
        let state = match state {
            UploadState::AwaitingRetry { .. } => advance(state, UploadEvent::RetryRequested),
            other => other,
        };

        match self.transport.upload(&request, progress).await {
            Ok(response) => {
                advance(state, UploadEvent::SubmitSucceeded);
                Ok(ShareLink::new(&self.origin, response.share_id, &key))
            }
            Err(e) => {
                let error = ClientError::from(e);
                tracing::warn!("Upload submission failed: {}", error);
                let state = advance(state, UploadEvent::SubmitFailed(error.upload_failure()));
                let retry = match state {
                    UploadState::AwaitingRetry { .. } => Some(PreparedUpload {
                        state,
                        key,
                        request,
                    }),
                    _ => None,
                };
                Err(SubmitError::new(error, retry))
            }
        }
    }

    /// Prepare and submit in one step.
    pub async fn upload(
        &self,
        file: &PlainFile,
        options: &UploadOptions,
        progress: &ProgressReporter,
    ) -> Result<ShareLink, ClientError> {
        let prepared = self.prepare(file, options)?;
        Ok(self.submit(prepared, progress).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportError};
    use zerok_drop_core::{sealed_len, NONCE_SIZE};

    const ORIGIN: &str = "https://drop.example";

    fn uploader() -> Uploader<MockTransport> {
        Uploader::new(MockTransport::new(), ORIGIN)
    }

    fn file() -> PlainFile {
        PlainFile::new("report.pdf", b"quarterly numbers".to_vec())
            .with_mime_type("application/pdf")
    }

    // ===========================================
    // Options Tests
    // ===========================================

    #[test]
    fn options_defaults() {
        let options = UploadOptions::new();
        assert_eq!(options.expiration_minutes(), DEFAULT_EXPIRATION_MINUTES);
        assert_eq!(options.password(), None);
        assert_eq!(options.download_limit(), None);
        assert!(!options.is_one_time());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn options_reject_out_of_range_expiration() {
        assert!(UploadOptions::new()
            .with_expiration_minutes(0)
            .validate()
            .is_err());
        assert!(UploadOptions::new()
            .with_expiration_minutes(MAX_EXPIRATION_MINUTES + 1)
            .validate()
            .is_err());
        assert!(UploadOptions::new()
            .with_expiration_minutes(MAX_EXPIRATION_MINUTES)
            .validate()
            .is_ok());
    }

    #[test]
    fn options_reject_zero_download_limit() {
        let result = UploadOptions::new().with_download_limit(0).validate();
        assert!(matches!(result, Err(ClientError::InvalidOptions(_))));
    }

    #[test]
    fn empty_password_means_none() {
        assert_eq!(UploadOptions::new().with_password("").password(), None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let options = UploadOptions::new().with_password("hunter2");
        assert!(!format!("{:?}", options).contains("hunter2"));
        assert!(!format!("{:?}", file()).contains("report.pdf"));
    }

    // ===========================================
    // Prepare Tests
    // ===========================================

    #[test]
    fn prepare_builds_request() {
        let uploader = uploader();
        let options = UploadOptions::new()
            .with_password("pw")
            .with_download_limit(3)
            .with_expiration_minutes(60);
        let prepared = uploader.prepare(&file(), &options).unwrap();
        let request = prepared.request();

        assert_eq!(request.file_size, 17);
        assert_eq!(request.mime_type, "application/pdf");
        assert_eq!(request.expiration_minutes, 60);
        assert_eq!(request.password.as_deref(), Some("pw"));
        assert_eq!(request.download_limit, Some(3));
        assert_eq!(request.iv.len(), NONCE_SIZE);
        assert_eq!(request.filename_iv.len(), NONCE_SIZE);
        assert_eq!(request.encrypted_data.len() as u64, sealed_len(17));
        assert_ne!(request.iv, request.filename_iv);
        assert!(matches!(prepared.state(), UploadState::Submit { attempt: 1 }));
    }

    #[test]
    fn prepare_never_sends_plaintext_or_key() {
        let uploader = uploader();
        let prepared = uploader.prepare(&file(), &UploadOptions::new()).unwrap();
        let body = serde_json::to_string(prepared.request()).unwrap();

        assert!(!body.contains("report.pdf"));
        assert!(!body.contains("quarterly"));
        assert!(!body.contains(&prepared.key.encode_for_sharing()));

        // Nor the raw key bytes in the encoding the body uses for binary fields
        use base64::{engine::general_purpose::STANDARD, Engine};
        assert!(!body.contains(&STANDARD.encode(prepared.key.as_bytes())));
    }

    #[tokio::test]
    async fn one_byte_over_maximum_is_refused_before_crypto() {
        let uploader = uploader().with_max_size(16);
        let result = uploader
            .upload(&file(), &UploadOptions::new(), &ProgressReporter::disabled())
            .await;

        assert!(matches!(
            result,
            Err(ClientError::Oversize { size: 17, max: 16 })
        ));
        assert!(uploader.transport().uploads().is_empty());
    }

    #[tokio::test]
    async fn exactly_maximum_is_accepted() {
        let uploader = uploader().with_max_size(17);
        uploader
            .upload(&file(), &UploadOptions::new(), &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(uploader.transport().uploads().len(), 1);
    }

    #[test]
    fn empty_file_is_accepted() {
        let uploader = uploader();
        let prepared = uploader
            .prepare(&PlainFile::new("empty.txt", vec![]), &UploadOptions::new())
            .unwrap();
        assert_eq!(prepared.request().encrypted_data.len() as u64, sealed_len(0));
    }

    #[test]
    fn empty_filename_is_rejected() {
        let result = uploader().prepare(&PlainFile::new("", vec![1]), &UploadOptions::new());
        assert!(matches!(result, Err(ClientError::InvalidOptions(_))));
    }

    #[test]
    fn each_prepare_uses_fresh_key_and_nonces() {
        let uploader = uploader();
        let a = uploader.prepare(&file(), &UploadOptions::new()).unwrap();
        let b = uploader.prepare(&file(), &UploadOptions::new()).unwrap();

        assert_ne!(a.key.encode_for_sharing(), b.key.encode_for_sharing());
        assert_ne!(a.request().iv, b.request().iv);
        assert_ne!(a.request().encrypted_data, b.request().encrypted_data);
    }

    // ===========================================
    // Submit Tests
    // ===========================================

    #[tokio::test]
    async fn upload_returns_link_with_key() {
        let uploader = uploader();
        let link = uploader
            .upload(&file(), &UploadOptions::new(), &ProgressReporter::disabled())
            .await
            .unwrap();

        assert_eq!(link.origin(), ORIGIN);
        assert!(link.to_string().starts_with("https://drop.example/"));
        assert!(link.to_string().contains('#'));
        assert!(SymmetricKey::decode_from_sharing(link.encoded_key()).is_ok());
        assert_eq!(uploader.transport().uploads().len(), 1);
    }

    #[tokio::test]
    async fn upload_reports_progress() {
        let uploader = uploader();
        let (progress, rx) = ProgressReporter::channel();
        uploader
            .upload(&file(), &UploadOptions::new(), &progress)
            .await
            .unwrap();

        assert!(rx.borrow().is_complete());
    }

    #[tokio::test]
    async fn network_failure_allows_retry_with_same_ciphertext() {
        let uploader = uploader();
        let prepared = uploader.prepare(&file(), &UploadOptions::new()).unwrap();
        let key = prepared.key.encode_for_sharing();

        uploader
            .transport()
            .fail_next_upload(TransportError::Network("connection reset".into()));
        let err = uploader
            .submit(prepared, &ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err.error(), ClientError::Network(_)));
        assert!(err.is_retriable());

        let retry = err.into_retry().unwrap();
        assert!(matches!(
            retry.state(),
            UploadState::AwaitingRetry { attempt: 1 }
        ));

        let link = uploader
            .submit(retry, &ProgressReporter::disabled())
            .await
            .unwrap();
        assert_eq!(link.encoded_key(), key);

        let uploads = uploader.transport().uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].encrypted_data, uploads[1].encrypted_data);
        assert_eq!(uploads[0].iv, uploads[1].iv);
    }

    #[tokio::test]
    async fn rejection_is_not_retriable() {
        let uploader = uploader();
        uploader.transport().fail_next_upload(TransportError::Rejected {
            status: 413,
            message: "too large".into(),
        });

        let err = uploader
            .submit(
                uploader.prepare(&file(), &UploadOptions::new()).unwrap(),
                &ProgressReporter::disabled(),
            )
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
        assert!(matches!(
            err.into_error(),
            ClientError::Rejected { status: 413, .. }
        ));
    }
}
