//! Upload and download state machines for 0k-Drop.
//!
//! Both machines are pure: they take events as input and produce a new
//! state plus the actions the driver should perform next. The actual I/O
//! (encrypting buffers, HTTP calls) is performed by drop-client.
//!
//! ```text
//! Upload:   SelectPlaintext → GenerateKey → EncryptContent → EncryptFilename
//!               → Submit ⇄ AwaitingRetry → LinkBuilt
//!
//! Download: ParseLink → AwaitingKey ─(key supplied)─┐
//!                    └→ DecodeKey ←─────────────────┘
//!               → Fetch → DecryptContent → DecryptFilename → Emitted
//! ```
//!
//! Any non-terminal state moves to `Failed` on a failure event. The key is
//! decoded before the fetch, so a malformed fragment never costs a
//! one-time download.

/// Largest plaintext accepted for upload (5 GiB).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024 * 1024;

// ===========================================
// Upload
// ===========================================

/// Upload state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Waiting for the plaintext file.
    SelectPlaintext,
    /// Size accepted; a key must be generated.
    GenerateKey,
    /// Key ready; content must be encrypted.
    EncryptContent,
    /// Content sealed; filename must be encrypted.
    EncryptFilename,
    /// Ciphertext ready; submission in flight.
    Submit {
        /// Submission attempt, starting at 1.
        attempt: u32,
    },
    /// Submission failed on the network; ciphertext and key are kept.
    AwaitingRetry {
        /// The attempt that failed.
        attempt: u32,
    },
    /// Link produced. Terminal.
    LinkBuilt,
    /// Terminal failure.
    Failed(UploadFailure),
}

impl UploadState {
    /// Create a new state machine in the SelectPlaintext state.
    pub fn new() -> Self {
        Self::SelectPlaintext
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (drop-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: UploadEvent) -> (Self, Vec<UploadAction>) {
        match (self, event) {
            (Self::SelectPlaintext, UploadEvent::PlaintextSelected { size, max }) => {
                if size > max {
                    (Self::Failed(UploadFailure::Oversize { size, max }), vec![])
                } else {
                    (Self::GenerateKey, vec![UploadAction::GenerateKey])
                }
            }
            (Self::GenerateKey, UploadEvent::KeyGenerated) => {
                (Self::EncryptContent, vec![UploadAction::EncryptContent])
            }
            (Self::EncryptContent, UploadEvent::ContentEncrypted) => {
                (Self::EncryptFilename, vec![UploadAction::EncryptFilename])
            }
            (Self::EncryptFilename, UploadEvent::FilenameEncrypted) => {
                (Self::Submit { attempt: 1 }, vec![UploadAction::Submit])
            }
            (Self::Submit { .. }, UploadEvent::SubmitSucceeded) => {
                (Self::LinkBuilt, vec![UploadAction::BuildLink])
            }
            (Self::Submit { attempt }, UploadEvent::SubmitFailed(failure)) => {
                if failure.is_retriable() {
                    (Self::AwaitingRetry { attempt }, vec![])
                } else {
                    (Self::Failed(failure), vec![])
                }
            }
            (Self::AwaitingRetry { attempt }, UploadEvent::RetryRequested) => (
                Self::Submit {
                    attempt: attempt.saturating_add(1),
                },
                vec![UploadAction::Submit],
            ),
            (state, UploadEvent::Failed(failure)) if !state.is_terminal() => {
                (Self::Failed(failure), vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the machine has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LinkBuilt | Self::Failed(_))
    }

    /// The failure, if the machine failed.
    pub fn failure(&self) -> Option<&UploadFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl Default for UploadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur during an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// The user picked a file.
    PlaintextSelected {
        /// Plaintext size in bytes.
        size: u64,
        /// Largest accepted size.
        max: u64,
    },
    /// A fresh key exists.
    KeyGenerated,
    /// Content ciphertext is ready.
    ContentEncrypted,
    /// Filename ciphertext is ready.
    FilenameEncrypted,
    /// The server stored the ciphertext.
    SubmitSucceeded,
    /// The server or the network refused the submission.
    SubmitFailed(UploadFailure),
    /// The caller wants to resubmit the same ciphertext.
    RetryRequested,
    /// A local step failed.
    Failed(UploadFailure),
}

/// Actions to be executed by the upload driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAction {
    /// Generate the transfer key.
    GenerateKey,
    /// Encrypt the file content.
    EncryptContent,
    /// Encrypt the filename.
    EncryptFilename,
    /// Send the ciphertext to the server.
    Submit,
    /// Render the share link.
    BuildLink,
}

/// Why an upload stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    /// File larger than the limit. Detected before any cryptography.
    Oversize {
        /// Plaintext size.
        size: u64,
        /// Limit.
        max: u64,
    },
    /// No randomness for a key or nonce.
    Entropy,
    /// AEAD failure while sealing.
    Encryption,
    /// Transport failure; the same ciphertext may be resubmitted.
    Network,
    /// The server rejected the request.
    Rejected,
}

impl UploadFailure {
    /// Whether the upload can be resubmitted without re-encrypting.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Network)
    }
}

// ===========================================
// Download
// ===========================================

/// Download state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    /// Waiting for the share link.
    ParseLink,
    /// The link had no fragment. No request has been made.
    AwaitingKey,
    /// A key string is available and must be decoded.
    DecodeKey,
    /// Key is valid; ciphertext must be fetched.
    Fetch,
    /// Ciphertext fetched; content must be decrypted.
    DecryptContent,
    /// Content authenticated; filename must be decrypted.
    DecryptFilename,
    /// Plaintext released to the caller. Terminal.
    Emitted {
        /// The server burned the share with this download.
        burned: bool,
    },
    /// Terminal failure.
    Failed(DownloadFailure),
}

impl DownloadState {
    /// Create a new state machine in the ParseLink state.
    pub fn new() -> Self {
        Self::ParseLink
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: DownloadEvent) -> (Self, Vec<DownloadAction>) {
        match (self, event) {
            (Self::ParseLink, DownloadEvent::LinkParsed { has_key: true }) => {
                (Self::DecodeKey, vec![DownloadAction::DecodeKey])
            }
            (Self::ParseLink, DownloadEvent::LinkParsed { has_key: false }) => {
                (Self::AwaitingKey, vec![DownloadAction::RequestKey])
            }
            (Self::ParseLink | Self::AwaitingKey, DownloadEvent::KeyProvided) => {
                (Self::DecodeKey, vec![DownloadAction::DecodeKey])
            }
            (Self::DecodeKey, DownloadEvent::KeyDecoded) => {
                (Self::Fetch, vec![DownloadAction::Fetch])
            }
            (Self::Fetch, DownloadEvent::Fetched) => {
                (Self::DecryptContent, vec![DownloadAction::DecryptContent])
            }
            (Self::DecryptContent, DownloadEvent::ContentDecrypted) => {
                (Self::DecryptFilename, vec![DownloadAction::DecryptFilename])
            }
            (Self::DecryptFilename, DownloadEvent::FilenameDecrypted { burned }) => {
                let mut actions = vec![DownloadAction::Emit];
                if burned {
                    actions.push(DownloadAction::MarkBurned);
                }
                (Self::Emitted { burned }, actions)
            }
            (Self::Fetch, DownloadEvent::Failed(DownloadFailure::Burned)) => (
                Self::Failed(DownloadFailure::Burned),
                vec![DownloadAction::MarkBurned],
            ),
            (state, DownloadEvent::Failed(failure)) if !state.is_terminal() => {
                (Self::Failed(failure), vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the machine has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Emitted { .. } | Self::Failed(_))
    }

    /// Check if the machine is blocked on a key from outside the link.
    pub fn is_awaiting_key(&self) -> bool {
        matches!(self, Self::AwaitingKey)
    }

    /// The failure, if the machine failed.
    pub fn failure(&self) -> Option<&DownloadFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl Default for DownloadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur during a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// The link was parsed.
    LinkParsed {
        /// The link carried a non-empty fragment.
        has_key: bool,
    },
    /// A key string was supplied out of band.
    KeyProvided,
    /// The key string decoded to 32 bytes.
    KeyDecoded,
    /// The server returned ciphertext.
    Fetched,
    /// Content authenticated and decrypted.
    ContentDecrypted,
    /// Filename authenticated and decrypted.
    FilenameDecrypted {
        /// The server reported the share as burned by this download.
        burned: bool,
    },
    /// A step failed.
    Failed(DownloadFailure),
}

/// Actions to be executed by the download driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadAction {
    /// Ask the caller for the key (the link had none).
    RequestKey,
    /// Decode the fragment into a key.
    DecodeKey,
    /// Fetch ciphertext from the server.
    Fetch,
    /// Decrypt the content stream.
    DecryptContent,
    /// Decrypt the filename.
    DecryptFilename,
    /// Hand the plaintext to the caller.
    Emit,
    /// Remember the share as burned; later attempts fail without a request.
    MarkBurned,
}

/// Why a download stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// The link could not be parsed.
    InvalidLink,
    /// The fragment is not a valid key.
    KeyDecode,
    /// Password missing or wrong.
    Access,
    /// One-time share already consumed or download limit reached.
    Burned,
    /// Unknown or expired share.
    NotFound,
    /// Transport failure.
    Network,
    /// Server refused the request for another reason.
    Rejected,
    /// Server response was not understood.
    Malformed,
    /// Ciphertext failed authentication.
    Authentication,
}
