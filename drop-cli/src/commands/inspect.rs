//! Show what a share link contains without contacting the relay.

use anyhow::Result;
use zerok_drop_client::ClientError;
use zerok_drop_core::{link, SymmetricKey};

/// State of the key fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// No fragment.
    Missing,
    /// A well-formed 256-bit key.
    Valid,
    /// A fragment that is not a key.
    Invalid(String),
}

/// Parsed view of a link. Never holds the key itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    /// Relay origin.
    pub origin: String,
    /// Share id.
    pub share_id: String,
    /// Key fragment status.
    pub key: KeyStatus,
}

/// Parse a link and check its key.
pub fn summarize(url: &str) -> Result<LinkSummary> {
    let parsed = link::parse(url).map_err(ClientError::from)?;
    let key = match parsed.encoded_key.as_deref() {
        None => KeyStatus::Missing,
        Some(encoded) => match SymmetricKey::decode_from_sharing(encoded) {
            Ok(_) => KeyStatus::Valid,
            Err(e) => KeyStatus::Invalid(e.to_string()),
        },
    };
    Ok(LinkSummary {
        origin: parsed.origin,
        share_id: parsed.share_id.to_string(),
        key,
    })
}

/// Run the inspect command.
pub fn run(url: &str) -> Result<()> {
    let summary = summarize(url)?;

    println!("Origin:   {}", summary.origin);
    println!("Share ID: {}", summary.share_id);
    match &summary.key {
        KeyStatus::Missing => println!("Key:      missing (ask the sender for the part after '#')"),
        KeyStatus::Valid => println!("Key:      present"),
        KeyStatus::Invalid(reason) => println!("Key:      invalid ({})", reason),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerok_drop_core::ShareLink;
    use zerok_drop_types::ShareId;

    #[test]
    fn summarize_full_link() {
        let key = SymmetricKey::generate().unwrap();
        let link = ShareLink::new(
            "https://drop.example",
            ShareId::new("abc123").unwrap(),
            &key,
        );

        let summary = summarize(&link.to_string()).unwrap();
        assert_eq!(summary.origin, "https://drop.example");
        assert_eq!(summary.share_id, "abc123");
        assert_eq!(summary.key, KeyStatus::Valid);
        assert!(!format!("{:?}", summary).contains(link.encoded_key()));
    }

    #[test]
    fn summarize_without_fragment() {
        let summary = summarize("https://drop.example/abc123").unwrap();
        assert_eq!(summary.key, KeyStatus::Missing);
    }

    #[test]
    fn summarize_bad_fragment() {
        let summary = summarize("https://drop.example/abc123#short").unwrap();
        assert!(matches!(summary.key, KeyStatus::Invalid(_)));
    }

    #[test]
    fn summarize_rejects_garbage() {
        assert!(summarize("").is_err());
    }
}
