//! # drop-client
//!
//! Client library for the 0k-Drop zero-knowledge file transfer protocol.
//!
//! ## Features
//!
//! - **Client-side encryption**: XChaCha20-Poly1305, chunked content stream
//! - **Key in the fragment**: the server only ever sees ciphertext and a share id
//! - **Transport Abstraction**: Pluggable transport layer (HTTP, mock)
//! - **Pure State Machines**: Uses drop-core for side-effect-free sequencing
//!
//! ## Example
//!
//! ```ignore
//! use zerok_drop_client::{
//!     Downloader, HttpTransport, HttpTransportConfig, PlainFile, ProgressReporter,
//!     UploadOptions, Uploader,
//! };
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new("https://drop.example"))?;
//! let uploader = Uploader::new(transport.clone(), "https://drop.example");
//!
//! let file = PlainFile::new("notes.txt", b"hello".to_vec());
//! let options = UploadOptions::new().with_one_time(true);
//! let (progress, mut updates) = ProgressReporter::channel();
//! let link = uploader.upload(&file, &options, &progress).await?;
//!
//! let downloader = Downloader::new(transport);
//! let received = downloader.download(&link.to_string(), None).await?;
//! assert_eq!(received.bytes, b"hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod download;
pub mod error;
pub mod progress;
pub mod transport;
pub mod upload;

pub use download::{DownloadedFile, Downloader};
pub use error::{ClientError, SubmitError};
pub use progress::{ProgressReporter, UploadProgress};
pub use transport::{
    HttpTransport, HttpTransportConfig, MockTransport, Transport, TransportError,
};
pub use upload::{PlainFile, PreparedUpload, UploadOptions, Uploader};
pub use zerok_drop_core::ShareLink;
