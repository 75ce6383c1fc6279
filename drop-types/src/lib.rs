//! # drop-types
//!
//! Wire format types for the 0k-Drop zero-knowledge file transfer protocol.
//!
//! This crate provides the types shared by the client and the relay:
//! - [`ShareId`] - Server-assigned identifier for an uploaded file
//! - [`UploadRequest`] / [`UploadResponse`] - `POST /api/v1/upload`
//! - [`DownloadRequest`] / [`DownloadResponse`] - `POST /api/v1/download/{shareId}`
//! - [`ErrorBody`] - Error payload returned on any non-2xx response
//! - [`TypesError`] - Error types
//!
//! Everything here is ciphertext or access-control metadata. Key material
//! has no representation in this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod api;
mod error;
mod ids;

pub use api::{
    download_path, CaptchaFields, DownloadRequest, DownloadResponse, ErrorBody, UploadRequest,
    UploadResponse, API_PREFIX, DEFAULT_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES,
    MIN_EXPIRATION_MINUTES, UPLOAD_PATH,
};
pub use error::TypesError;
pub use ids::{ShareId, MAX_SHARE_ID_LEN};
