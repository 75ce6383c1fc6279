//! CLI command implementations.

pub mod configure;
pub mod download;
pub mod inspect;
pub mod upload;
