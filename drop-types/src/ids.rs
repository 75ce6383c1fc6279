//! Identity types for 0k-Drop.

use crate::error::TypesError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length of a share id.
pub const MAX_SHARE_ID_LEN: usize = 64;

/// Random bytes behind a relay-generated share id (16 base64 chars).
const GENERATED_ID_BYTES: usize = 12;

/// The server-assigned identifier of an uploaded file.
///
/// Appears in the path component of a share link. It locates the ciphertext
/// but is useless without the key carried in the link fragment.
///
/// Valid ids are 1-64 characters from the URL-safe alphabet `[A-Za-z0-9_-]`,
/// so they never need percent-encoding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareId(String);

impl ShareId {
    /// Parse and validate a share id.
    pub fn new(value: impl Into<String>) -> Result<Self, TypesError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypesError::InvalidShareId("empty".into()));
        }
        if value.len() > MAX_SHARE_ID_LEN {
            return Err(TypesError::InvalidShareId(format!(
                "{} characters exceeds limit of {}",
                value.len(),
                MAX_SHARE_ID_LEN
            )));
        }
        if !value.chars().all(is_url_safe_char) {
            return Err(TypesError::InvalidShareId(
                "characters must be A-Z, a-z, 0-9, '-' or '_'".into(),
            ));
        }
        Ok(Self(value))
    }

    /// Generate a fresh random share id (relay side).
    pub fn generate() -> Result<Self, TypesError> {
        let mut bytes = [0u8; GENERATED_ID_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|e| TypesError::Entropy(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_url_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl TryFrom<String> for ShareId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShareId> for String {
    fn from(id: ShareId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ShareId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ShareId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_valid() {
        let id = ShareId::generate().unwrap();
        assert_eq!(id.as_str().len(), 16); // 12 bytes = 16 base64 chars
        assert!(ShareId::new(id.as_str()).is_ok());
    }

    #[test]
    fn generated_ids_differ() {
        let a = ShareId::generate().unwrap();
        let b = ShareId::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn accepts_url_safe_ids() {
        assert!(ShareId::new("abc123").is_ok());
        assert!(ShareId::new("a-b_C").is_ok());
        assert!(ShareId::new("x".repeat(MAX_SHARE_ID_LEN)).is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            ShareId::new(""),
            Err(TypesError::InvalidShareId(_))
        ));
    }

    #[test]
    fn rejects_too_long() {
        let long = "x".repeat(MAX_SHARE_ID_LEN + 1);
        assert!(ShareId::new(long).is_err());
    }

    #[test]
    fn rejects_path_and_fragment_characters() {
        assert!(ShareId::new("abc/def").is_err());
        assert!(ShareId::new("abc#def").is_err());
        assert!(ShareId::new("abc?x=1").is_err());
        assert!(ShareId::new("abc def").is_err());
        assert!(ShareId::new("../etc").is_err());
    }

    #[test]
    fn serde_is_transparent_string() {
        let id = ShareId::new("abc123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");

        let back: ShareId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_invalid_id() {
        let result: Result<ShareId, _> = serde_json::from_str("\"bad/id\"");
        assert!(result.is_err());
    }

    #[test]
    fn display_is_raw_id() {
        let id = ShareId::new("abc123").unwrap();
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(format!("{:?}", id), "ShareId(abc123)");
    }
}
