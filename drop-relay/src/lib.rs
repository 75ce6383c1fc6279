//! # drop-relay
//!
//! Zero-knowledge relay server for 0k-Drop.
//!
//! This crate implements a relay server that:
//! - Accepts encrypted uploads over HTTP and assigns each a share id
//! - Releases ciphertext to downloaders, subject to the share's policy
//! - Enforces expiry, download limits, one-time burn and share passwords
//! - Never sees plaintext or keys (the key lives in the link fragment)
//!
//! ## Architecture
//!
//! ```text
//! Uploader ──┐                    ┌── Downloader
//!            │   HTTPS + JSON     │
//!            ├───────────────────►│
//!            │                    │
//!        ┌───┴────────────────────┴───┐
//!        │        drop-relay          │
//!        │  ┌─────────────────────┐   │
//!        │  │  SQLite (shares)    │   │
//!        │  └─────────────────────┘   │
//!        └────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `POST /api/v1/upload` → `201` with `{ shareId, expiresAt }`
//! - `POST /api/v1/download/{shareId}` → `200` with the ciphertext
//! - `GET /health`, `GET /metrics`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod limits;
pub mod password;
pub mod server;
pub mod storage;
