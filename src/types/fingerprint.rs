use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable, content-derived identity for a queue item or resource.
///
/// Two items with equal fingerprints are the same queue entry; the fingerprint
/// is the dedup and lookup key across every collection. It must stay stable
/// for the item's lifetime and be deterministic given the item's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed identity string
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Derive a fingerprint from raw content (hex SHA-256)
    pub fn of_bytes(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use fmt::Write;
            let _ = write!(hex, "{:02x}", byte);
        }
        Self(hex)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
