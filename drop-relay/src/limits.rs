//! Rate limiting for drop-relay.
//!
//! Provides protection against upload flooding and share-id guessing.
//!
//! ## Design Notes
//!
//! Clients are keyed by IP address. Uploads and download attempts have
//! separate per-client quotas; a global limiter caps aggregate throughput.
//! All keyed limiters use the governor crate backed by DashMap.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits uploads per client IP.
    upload_limiter: Arc<KeyedLimiter<IpAddr>>,

    /// Limits download attempts per client IP, failed password checks
    /// included.
    download_limiter: Arc<KeyedLimiter<IpAddr>>,

    /// Global rate limiter across all clients.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("upload_limiter", &"KeyedLimiter<IpAddr>")
            .field("download_limiter", &"KeyedLimiter<IpAddr>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

/// A configured rate of zero is treated as one.
fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl RateLimits {
    /// Create rate limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        let upload_quota = Quota::per_minute(non_zero(config.uploads_per_minute));
        let download_quota = Quota::per_minute(non_zero(config.downloads_per_minute));
        let global_quota = Quota::per_second(non_zero(config.global_requests_per_second));

        Self {
            upload_limiter: Arc::new(RateLimiter::keyed(upload_quota)),
            download_limiter: Arc::new(RateLimiter::keyed(download_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if an upload from `ip` is allowed.
    pub fn check_upload(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.check_global()?;
        self.upload_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::UploadLimitExceeded)
    }

    /// Check if a download attempt from `ip` is allowed.
    pub fn check_download(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.check_global()?;
        self.download_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::DownloadLimitExceeded)
    }

    /// Check if the global request rate is within limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Get the number of tracked client keys (for metrics).
    pub fn tracked_clients(&self) -> usize {
        self.upload_limiter.len() + self.download_limiter.len()
    }

    /// Evict stale entries from the keyed rate limiter DashMaps.
    ///
    /// `retain_recent()` removes entries whose rate limit cells have fully
    /// recharged. Call periodically from the cleanup task.
    pub fn shrink(&self) {
        self.upload_limiter.retain_recent();
        self.download_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many uploads from this client.
    UploadLimitExceeded,
    /// Too many download attempts from this client.
    DownloadLimitExceeded,
    /// Global request rate exceeded across all clients.
    GlobalLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UploadLimitExceeded => {
                write!(f, "upload rate limit exceeded")
            }
            Self::DownloadLimitExceeded => {
                write!(f, "download rate limit exceeded")
            }
            Self::GlobalLimitExceeded => {
                write!(f, "global rate limit exceeded")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}
