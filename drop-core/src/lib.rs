//! # drop-core
//!
//! Pure logic for 0k-Drop (no I/O, instant tests).
//!
//! This crate implements the cryptography, the share link format, and the
//! upload/download state machines without any network or disk I/O.
//!
//! ## Modules
//!
//! - [`keys`] - Key generation, import, and link-fragment encoding
//! - [`cipher`] - XChaCha20-Poly1305 for filenames and chunked content streams
//! - [`link`] - `<origin>/<shareId>#<key>` build and parse
//! - [`state`] - Upload and download state machines
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects beyond drawing OS randomness. The actual I/O (HTTP,
//! files) is performed by `drop-client`, which drives these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cipher;
pub mod keys;
pub mod link;
pub mod state;

pub use cipher::{
    sealed_len, CipherError, CipherHandle, ContentOpener, ContentSealer, Nonce, Sealed,
    CHUNK_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use keys::{import, KeyError, SymmetricKey, ENCODED_KEY_LEN, KEY_SIZE};
pub use link::{LinkError, ParsedLink, ShareLink};
pub use state::{
    DownloadAction, DownloadEvent, DownloadFailure, DownloadState, UploadAction, UploadEvent,
    UploadFailure, UploadState, MAX_FILE_SIZE,
};
