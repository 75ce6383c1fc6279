//! Share link format for 0k-Drop.
//!
//! ```text
//! https://drop.example/Ab3dE5fG7hJ9kL1m#q2W3e4R5t6Y7u8I9o0P1a2S3d4F5g6H7j8K9l0Z1x2C
//! └──────origin──────┘└───share id───┘ └──────────── encoded key ────────────┘
//! ```
//!
//! The key lives in the fragment. User agents do not send fragments in HTTP
//! requests, and the transports in this workspace only ever send the share id,
//! so the server never observes the key.

use crate::keys::SymmetricKey;
use thiserror::Error;
use zerok_drop_types::{ShareId, TypesError};

/// Link parsing errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Nothing to parse.
    #[error("share link is empty")]
    Empty,

    /// The link has no path segment to use as a share id.
    #[error("share link has no share id")]
    MissingShareId,

    /// The path segment is not a valid share id.
    #[error("share link has an invalid share id: {0}")]
    InvalidShareId(#[from] TypesError),
}

/// Build a share link.
///
/// A trailing `/` on `origin` is not doubled.
pub fn build(origin: &str, share_id: &ShareId, encoded_key: &str) -> String {
    format!(
        "{}/{}#{}",
        origin.trim_end_matches('/'),
        share_id,
        encoded_key
    )
}

/// Parse a share link.
///
/// The share id is the last non-empty path segment; everything before it is
/// the origin. Query strings are ignored. A missing or empty fragment yields
/// `encoded_key: None`, which the download flow treats as "key missing"
/// rather than "key invalid".
pub fn parse(url: &str) -> Result<ParsedLink, LinkError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(LinkError::Empty);
    }

    let (location, fragment) = match url.split_once('#') {
        Some((location, fragment)) => (location, Some(fragment)),
        None => (url, None),
    };
    let location = location.split('?').next().unwrap_or(location);
    let location = location.trim_end_matches('/');

    // Never treat the host of "scheme://host" as a share id
    let path_start = location
        .find("://")
        .map(|i| {
            let after = i + 3;
            location[after..]
                .find('/')
                .map(|j| after + j)
                .unwrap_or(location.len())
        })
        .unwrap_or(0);

    let (origin, segment) = match location[path_start..].rfind('/') {
        Some(i) => {
            let split = path_start + i;
            (&location[..split], &location[split + 1..])
        }
        None if path_start == 0 => ("", location),
        None => (location, ""),
    };

    if segment.is_empty() {
        return Err(LinkError::MissingShareId);
    }

    let encoded_key = fragment
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    Ok(ParsedLink {
        origin: origin.to_string(),
        share_id: ShareId::new(segment)?,
        encoded_key,
    })
}

/// Result of [`parse`].
#[derive(Clone, PartialEq, Eq)]
pub struct ParsedLink {
    /// Everything before the share id, without a trailing `/`.
    pub origin: String,
    /// The share id from the last path segment.
    pub share_id: ShareId,
    /// The raw fragment, if present and non-empty. Not yet validated.
    pub encoded_key: Option<String>,
}

impl std::fmt::Debug for ParsedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedLink")
            .field("origin", &self.origin)
            .field("share_id", &self.share_id)
            .field("encoded_key", &self.encoded_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A complete share link: where the ciphertext is, and how to open it.
///
/// `Display` renders the full URL including the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareLink {
    origin: String,
    share_id: ShareId,
    encoded_key: String,
}

impl ShareLink {
    /// Assemble a link for `share_id` carrying `key`.
    pub fn new(origin: &str, share_id: ShareId, key: &SymmetricKey) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            share_id,
            encoded_key: key.encode_for_sharing(),
        }
    }

    /// The origin the link points at.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The share id.
    pub fn share_id(&self) -> &ShareId {
        &self.share_id
    }

    /// The encoded key from the fragment.
    pub fn encoded_key(&self) -> &str {
        &self.encoded_key
    }
}

impl std::fmt::Display for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&build(&self.origin, &self.share_id, &self.encoded_key))
    }
}

impl std::fmt::Debug for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLink")
            .field("origin", &self.origin)
            .field("share_id", &self.share_id)
            .field("encoded_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> ShareId {
        ShareId::new(s).unwrap()
    }

    #[test]
    fn build_format() {
        let link = build("https://drop.example", &id("abc123"), "KEY");
        assert_eq!(link, "https://drop.example/abc123#KEY");
    }

    #[test]
    fn build_does_not_double_slash() {
        let link = build("https://drop.example/", &id("abc123"), "KEY");
        assert_eq!(link, "https://drop.example/abc123#KEY");
    }

    #[test]
    fn parse_full_link() {
        let parsed = parse("https://drop.example/abc123#KEY").unwrap();
        assert_eq!(parsed.origin, "https://drop.example");
        assert_eq!(parsed.share_id, id("abc123"));
        assert_eq!(parsed.encoded_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn parse_without_fragment_has_no_key() {
        let parsed = parse("https://drop.example/abc123").unwrap();
        assert_eq!(parsed.share_id, id("abc123"));
        assert_eq!(parsed.encoded_key, None);
    }

    #[test]
    fn parse_empty_fragment_has_no_key() {
        let parsed = parse("https://drop.example/abc123#").unwrap();
        assert_eq!(parsed.encoded_key, None);
    }

    #[test]
    fn parse_ignores_query() {
        let parsed = parse("https://drop.example/abc123?utm=x#KEY").unwrap();
        assert_eq!(parsed.share_id, id("abc123"));
        assert_eq!(parsed.encoded_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn parse_keeps_path_prefix_in_origin() {
        let parsed = parse("http://localhost:8080/d/abc123/#KEY").unwrap();
        assert_eq!(parsed.origin, "http://localhost:8080/d");
        assert_eq!(parsed.share_id, id("abc123"));
    }

    #[test]
    fn parse_bare_share_id() {
        let parsed = parse("abc123#KEY").unwrap();
        assert_eq!(parsed.origin, "");
        assert_eq!(parsed.share_id, id("abc123"));
    }

    #[test]
    fn parse_origin_only_has_no_share_id() {
        assert!(matches!(
            parse("https://drop.example/#KEY"),
            Err(LinkError::MissingShareId)
        ));
        assert!(matches!(
            parse("https://drop.example"),
            Err(LinkError::MissingShareId)
        ));
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(parse("   "), Err(LinkError::Empty)));
    }

    #[test]
    fn parse_rejects_invalid_share_id() {
        assert!(matches!(
            parse("https://drop.example/bad%20id#KEY"),
            Err(LinkError::InvalidShareId(_))
        ));
    }

    #[test]
    fn share_link_display_and_debug() {
        let key = SymmetricKey::from_bytes([9u8; 32]);
        let link = ShareLink::new("https://drop.example/", id("abc123"), &key);

        let url = link.to_string();
        assert_eq!(
            url,
            format!("https://drop.example/abc123#{}", key.encode_for_sharing())
        );

        let debug = format!("{:?}", link);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&key.encode_for_sharing()));
    }

    proptest! {
        #[test]
        fn build_parse_roundtrip(
            host in "[a-z]{1,12}\\.[a-z]{2,5}",
            share in "[A-Za-z0-9_-]{1,64}",
            bytes in proptest::array::uniform32(any::<u8>()),
        ) {
            let origin = format!("https://{}", host);
            let key = SymmetricKey::from_bytes(bytes).encode_for_sharing();
            let share_id = ShareId::new(share).unwrap();

            let parsed = parse(&build(&origin, &share_id, &key)).unwrap();
            prop_assert_eq!(parsed.origin, origin);
            prop_assert_eq!(parsed.share_id, share_id);
            prop_assert_eq!(parsed.encoded_key, Some(key));
        }
    }
}
