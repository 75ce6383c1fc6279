//! Main DropRelay server coordination.
//!
//! DropRelay owns storage, password hashing, rate limits and metrics, and
//! implements the upload and download rules. The HTTP layer only translates.

use crate::config::Config;
use crate::error::{PasswordError, StorageError};
use crate::limits::RateLimits;
use crate::password::PasswordHashing;
use crate::storage::{current_timestamp, Claim, NewShare, ShareStorage, SqliteStorage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use zerok_drop_core::{sealed_len, MAX_FILE_SIZE, NONCE_SIZE, TAG_SIZE};
use zerok_drop_types::{
    DownloadResponse, ShareId, UploadRequest, UploadResponse, MAX_EXPIRATION_MINUTES,
    MIN_EXPIRATION_MINUTES,
};

/// Longest accepted MIME type.
pub const MAX_MIME_TYPE_LEN: usize = 255;

/// Attempts at finding an unused share id.
const SHARE_ID_ATTEMPTS: usize = 3;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Counters are `AtomicU64`; incrementing takes no lock.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total shares stored.
    pub uploads_total: AtomicU64,
    /// Total downloads released.
    pub downloads_total: AtomicU64,
    /// Total shares burned by a download.
    pub burns_total: AtomicU64,
    /// Total ciphertext bytes received.
    pub bytes_received: AtomicU64,
    /// Total ciphertext bytes sent.
    pub bytes_sent: AtomicU64,
    /// Total rejected password attempts (missing or wrong).
    pub password_failures: AtomicU64,
    /// Total rate limit rejections.
    pub rate_limit_hits: AtomicU64,
    /// Total failed requests (validation, storage, etc.).
    pub errors_total: AtomicU64,
}

impl RelayMetrics {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Count a rate limit rejection.
    pub fn record_rate_limit(&self) {
        Self::inc(&self.rate_limit_hits);
    }

    /// Count a failed request.
    pub fn record_error(&self) {
        Self::inc(&self.errors_total);
    }
}

/// Why the relay refused a request.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    /// The request is malformed or out of range.
    #[error("{0}")]
    Invalid(String),

    /// Unknown or expired share.
    #[error("File not found or expired")]
    NotFound,

    /// One-time share consumed or download limit reached.
    #[error("File is no longer available")]
    Burned,

    /// The share is protected and no password was given.
    #[error("Password required")]
    PasswordRequired,

    /// The given password is wrong.
    #[error("Incorrect password")]
    PasswordIncorrect,

    /// Storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Password hashing failed.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// A blocking task panicked or was cancelled.
    #[error("internal task failed: {0}")]
    Task(String),
}

/// Main relay server.
pub struct DropRelay {
    config: Config,
    storage: Arc<SqliteStorage>,
    passwords: PasswordHashing,
    /// Rate limiters for uploads and downloads.
    rate_limits: RateLimits,
    /// Operational metrics (counters).
    metrics: RelayMetrics,
}

impl std::fmt::Debug for DropRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropRelay")
            .field("config", &self.config)
            .field("passwords", &self.passwords)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl DropRelay {
    /// Create a new DropRelay with the given config and storage.
    pub fn new(config: Config, storage: SqliteStorage) -> Result<Self, PasswordError> {
        let passwords = PasswordHashing::new(&config.passwords)?;
        Ok(Self::with_password_hashing(config, storage, passwords))
    }

    /// Create a DropRelay with explicit password hashing parameters.
    pub fn with_password_hashing(
        config: Config,
        storage: SqliteStorage,
        passwords: PasswordHashing,
    ) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            storage: Arc::new(storage),
            passwords,
            rate_limits,
            metrics: RelayMetrics::default(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get a clone of the storage Arc for background tasks.
    pub fn storage_arc(&self) -> Arc<SqliteStorage> {
        self.storage.clone()
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Validate and store an upload.
    pub async fn store(&self, request: UploadRequest) -> Result<UploadResponse, ShareError> {
        validate_upload(&request)?;

        let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(self.hash_password(password.to_string()).await?),
            None => None,
        };

        let now = current_timestamp();
        let expires_at = now + i64::from(request.expiration_minutes) * 60;
        let received = (request.encrypted_data.len() + request.encrypted_filename.len()) as u64;

        let mut share = NewShare {
            share_id: ShareId::generate().map_err(|e| ShareError::Task(e.to_string()))?,
            encrypted_data: request.encrypted_data,
            encrypted_filename: request.encrypted_filename,
            iv: request.iv,
            filename_iv: request.filename_iv,
            file_size: request.file_size,
            mime_type: request.mime_type,
            password_hash,
            download_limit: request.download_limit,
            one_time_download: request.one_time_download,
            created_at: now,
            expires_at,
        };

        let mut attempt = 1;
        loop {
            match self.storage.insert_share(&share).await {
                Ok(()) => break,
                Err(StorageError::Duplicate { .. }) if attempt < SHARE_ID_ATTEMPTS => {
                    tracing::warn!("Share id collision, regenerating");
                    share.share_id =
                        ShareId::generate().map_err(|e| ShareError::Task(e.to_string()))?;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        RelayMetrics::inc(&self.metrics.uploads_total);
        RelayMetrics::add(&self.metrics.bytes_received, received);
        tracing::info!(
            "Stored share {} ({} bytes, expires_at={}, one_time={}, limit={:?}, protected={})",
            share.share_id,
            received,
            expires_at,
            share.one_time_download,
            share.download_limit,
            share.password_hash.is_some()
        );

        Ok(UploadResponse {
            share_id: share.share_id,
            expires_at: expires_at as u64,
        })
    }

    /// Check access and release a share's ciphertext.
    ///
    /// The password is checked before the download is counted, so a failed
    /// check never consumes a one-time share.
    pub async fn fetch(
        &self,
        share_id: &ShareId,
        password: Option<&str>,
    ) -> Result<DownloadResponse, ShareError> {
        let now = current_timestamp();
        let record = self
            .storage
            .get_share(share_id)
            .await?
            .ok_or(ShareError::NotFound)?;

        if record.is_expired(now) {
            return Err(ShareError::NotFound);
        }
        if record.burned {
            return Err(ShareError::Burned);
        }

        if let Some(hash) = record.password_hash {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                RelayMetrics::inc(&self.metrics.password_failures);
                return Err(ShareError::PasswordRequired);
            };
            if !self.verify_password(password.to_string(), hash).await? {
                RelayMetrics::inc(&self.metrics.password_failures);
                tracing::debug!("Rejected password for share {}", share_id);
                return Err(ShareError::PasswordIncorrect);
            }
        }

        let claimed = match self.storage.claim_download(share_id, now).await? {
            Claim::Granted(claimed) => claimed,
            Claim::NotFound => return Err(ShareError::NotFound),
            Claim::Burned => return Err(ShareError::Burned),
        };

        let sent = (claimed.encrypted_data.len() + claimed.encrypted_filename.len()) as u64;
        RelayMetrics::inc(&self.metrics.downloads_total);
        RelayMetrics::add(&self.metrics.bytes_sent, sent);
        if claimed.burned {
            RelayMetrics::inc(&self.metrics.burns_total);
            tracing::info!("Share {} burned", share_id);
        }

        Ok(DownloadResponse {
            encrypted_data: claimed.encrypted_data,
            iv: claimed.iv,
            filename: claimed.encrypted_filename,
            filename_iv: claimed.filename_iv,
            one_time_download: claimed.one_time_download,
            mime_type: claimed.mime_type,
            file_size: claimed.file_size,
            downloads_remaining: claimed.downloads_remaining,
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, ShareError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| ShareError::Task(e.to_string()))?
            .map_err(ShareError::from)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, ShareError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.verify(&password, &hash))
            .await
            .map_err(|e| ShareError::Task(e.to_string()))?
            .map_err(ShareError::from)
    }
}

/// Check an upload against the accepted ranges and the ciphertext layout.
fn validate_upload(request: &UploadRequest) -> Result<(), ShareError> {
    if request.iv.len() != NONCE_SIZE || request.filename_iv.len() != NONCE_SIZE {
        return Err(ShareError::Invalid(format!(
            "nonces must be {} bytes",
            NONCE_SIZE
        )));
    }
    if request.encrypted_filename.len() < TAG_SIZE {
        return Err(ShareError::Invalid("encrypted filename is too short".into()));
    }
    if request.file_size > MAX_FILE_SIZE {
        return Err(ShareError::Invalid(format!(
            "file size exceeds the {} byte limit",
            MAX_FILE_SIZE
        )));
    }
    if request.encrypted_data.len() as u64 != sealed_len(request.file_size) {
        return Err(ShareError::Invalid(
            "encrypted data length does not match file size".into(),
        ));
    }
    if !(MIN_EXPIRATION_MINUTES..=MAX_EXPIRATION_MINUTES).contains(&request.expiration_minutes) {
        return Err(ShareError::Invalid(format!(
            "expiration must be between {} and {} minutes",
            MIN_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES
        )));
    }
    if request.download_limit == Some(0) {
        return Err(ShareError::Invalid("download limit must be at least 1".into()));
    }
    if request.mime_type.len() > MAX_MIME_TYPE_LEN {
        return Err(ShareError::Invalid("mime type is too long".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerok_drop_types::CaptchaFields;

    async fn test_relay() -> DropRelay {
        let storage = SqliteStorage::in_memory().await.unwrap();
        DropRelay::with_password_hashing(
            Config::default(),
            storage,
            PasswordHashing::insecure_fast().unwrap(),
        )
    }

    fn request(file_size: u64) -> UploadRequest {
        UploadRequest {
            encrypted_data: vec![7; sealed_len(file_size) as usize],
            encrypted_filename: vec![9; 24],
            iv: vec![1; NONCE_SIZE],
            filename_iv: vec![2; NONCE_SIZE],
            file_size,
            mime_type: "text/plain".into(),
            expiration_minutes: 60,
            password: None,
            download_limit: None,
            one_time_download: false,
            captcha: CaptchaFields::default(),
        }
    }

    // ===========================================
    // Upload Tests
    // ===========================================

    #[tokio::test]
    async fn store_and_fetch() {
        let relay = test_relay().await;
        let response = relay.store(request(10)).await.unwrap();
        assert_eq!(response.share_id.as_str().len(), 16);

        let fetched = relay.fetch(&response.share_id, None).await.unwrap();
        assert_eq!(fetched.encrypted_data.len() as u64, sealed_len(10));
        assert_eq!(fetched.filename, vec![9; 24]);
        assert_eq!(fetched.iv, vec![1; NONCE_SIZE]);
        assert_eq!(fetched.filename_iv, vec![2; NONCE_SIZE]);
        assert_eq!(relay.metrics().uploads_total.load(Ordering::Relaxed), 1);
        assert_eq!(relay.metrics().downloads_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn expires_at_follows_expiration_minutes() {
        let relay = test_relay().await;
        let before = current_timestamp() as u64;
        let response = relay.store(request(0)).await.unwrap();
        assert!(response.expires_at >= before + 3600);
        assert!(response.expires_at <= current_timestamp() as u64 + 3600);
    }

    #[tokio::test]
    async fn validation_rejects_bad_uploads() {
        let relay = test_relay().await;

        let mut bad_nonce = request(10);
        bad_nonce.iv = vec![0; 12];
        assert!(matches!(relay.store(bad_nonce).await, Err(ShareError::Invalid(_))));

        let mut bad_length = request(10);
        bad_length.encrypted_data.pop();
        assert!(matches!(relay.store(bad_length).await, Err(ShareError::Invalid(_))));

        let mut bad_expiry = request(10);
        bad_expiry.expiration_minutes = MAX_EXPIRATION_MINUTES + 1;
        assert!(matches!(relay.store(bad_expiry).await, Err(ShareError::Invalid(_))));

        let mut bad_limit = request(10);
        bad_limit.download_limit = Some(0);
        assert!(matches!(relay.store(bad_limit).await, Err(ShareError::Invalid(_))));

        let mut oversize = request(0);
        oversize.file_size = MAX_FILE_SIZE + 1;
        assert!(matches!(relay.store(oversize).await, Err(ShareError::Invalid(_))));
    }

    // ===========================================
    // Download Tests
    // ===========================================

    #[tokio::test]
    async fn unknown_share_is_not_found() {
        let relay = test_relay().await;
        let id = ShareId::new("nothing-here").unwrap();
        assert!(matches!(relay.fetch(&id, None).await, Err(ShareError::NotFound)));
    }

    #[tokio::test]
    async fn password_gate_does_not_consume() {
        let relay = test_relay().await;
        let mut req = request(10);
        req.password = Some("s3cret".into());
        req.one_time_download = true;
        let id = relay.store(req).await.unwrap().share_id;

        let record = relay.storage().get_share(&id).await.unwrap().unwrap();
        let hash = record.password_hash.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("s3cret"));

        assert!(matches!(
            relay.fetch(&id, None).await,
            Err(ShareError::PasswordRequired)
        ));
        assert!(matches!(
            relay.fetch(&id, Some("guess")).await,
            Err(ShareError::PasswordIncorrect)
        ));
        assert_eq!(relay.metrics().password_failures.load(Ordering::Relaxed), 2);

        let fetched = relay.fetch(&id, Some("s3cret")).await.unwrap();
        assert!(fetched.one_time_download);

        assert!(matches!(
            relay.fetch(&id, Some("s3cret")).await,
            Err(ShareError::Burned)
        ));
    }

    #[tokio::test]
    async fn download_limit_counts_down() {
        let relay = test_relay().await;
        let mut req = request(10);
        req.download_limit = Some(2);
        let id = relay.store(req).await.unwrap().share_id;

        let first = relay.fetch(&id, None).await.unwrap();
        assert_eq!(first.downloads_remaining, Some(1));
        let second = relay.fetch(&id, None).await.unwrap();
        assert_eq!(second.downloads_remaining, Some(0));
        assert!(matches!(relay.fetch(&id, None).await, Err(ShareError::Burned)));
        assert_eq!(relay.metrics().burns_total.load(Ordering::Relaxed), 1);
    }

    async fn file_backed_relay(dir: &tempfile::TempDir) -> Arc<DropRelay> {
        let storage = SqliteStorage::new(&dir.path().join("relay.db"))
            .await
            .unwrap();
        Arc::new(DropRelay::with_password_hashing(
            Config::default(),
            storage,
            PasswordHashing::insecure_fast().unwrap(),
        ))
    }

    /// Fire `n` fetches at once and count grants and burns.
    async fn concurrent_fetches(relay: &Arc<DropRelay>, id: &ShareId, n: usize) -> (usize, usize) {
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            let relay = Arc::clone(relay);
            let id = id.clone();
            handles.push(tokio::spawn(async move { relay.fetch(&id, None).await }));
        }

        let (mut granted, mut burned) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(ShareError::Burned) => burned += 1,
                Err(other) => panic!("unexpected fetch error: {other}"),
            }
        }
        (granted, burned)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_one_time_fetches_grant_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let relay = file_backed_relay(&dir).await;
        let mut req = request(10);
        req.one_time_download = true;
        let id = relay.store(req).await.unwrap().share_id;

        let (granted, burned) = concurrent_fetches(&relay, &id, 16).await;
        assert_eq!(granted, 1);
        assert_eq!(burned, 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_fetches_respect_download_limit() {
        let dir = tempfile::tempdir().unwrap();
        let relay = file_backed_relay(&dir).await;
        let mut req = request(10);
        req.download_limit = Some(3);
        let id = relay.store(req).await.unwrap().share_id;

        let (granted, burned) = concurrent_fetches(&relay, &id, 16).await;
        assert_eq!(granted, 3);
        assert_eq!(burned, 13);
    }

    #[tokio::test]
    async fn empty_password_means_unprotected() {
        let relay = test_relay().await;
        let mut req = request(10);
        req.password = Some(String::new());
        let id = relay.store(req).await.unwrap().share_id;

        assert!(relay.fetch(&id, None).await.is_ok());
    }
}
