//! Upload progress reporting.
//!
//! Progress is published on a `tokio::sync::watch` channel: the receiver
//! always sees the latest value and never blocks the upload.

use std::sync::Arc;
use tokio::sync::watch;

/// Bytes sent so far out of the request body total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes handed to the transport.
    pub loaded: u64,
    /// Total bytes in the request body.
    pub total: u64,
}

impl UploadProgress {
    /// Whole-number percentage, 0-100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.loaded.min(self.total) * 100) / self.total) as u8
    }

    /// Check if every byte has been sent.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.loaded >= self.total
    }
}

/// Sending half of a progress channel.
///
/// Cheap to clone; a disabled reporter drops every update.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<Arc<watch::Sender<UploadProgress>>>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver that observes it.
    pub fn channel() -> (Self, watch::Receiver<UploadProgress>) {
        let (tx, rx) = watch::channel(UploadProgress::default());
        (Self { tx: Some(Arc::new(tx)) }, rx)
    }

    /// A reporter nobody listens to.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Publish the current position.
    pub fn report(&self, loaded: u64, total: u64) {
        if let Some(tx) = &self.tx {
            tx.send_replace(UploadProgress { loaded, total });
        }
    }
}
