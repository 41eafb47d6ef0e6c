//! # Content digests
//!
//! A [`Sha`] is the SHA-1 of a document body. The repository compares digests
//! instead of full bodies to decide whether an update actually changed a
//! document, and the digest travels with the document so clients can tell two
//! revisions apart without diffing them.
//!
//! Digests serialise as 40-character lowercase hex strings.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// A 20-byte SHA-1 digest of a document body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Sha(pub [u8; 20]);

impl Sha {
    /// Digest raw bytes.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data.as_ref());
        let result = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&result);
        Sha(bytes)
    }

    /// Create a Sha from a hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 40 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Sha(bytes))
    }

    /// Return the hex string representation.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Sha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Sha> for String {
    fn from(sha: Sha) -> Self {
        sha.to_hex()
    }
}

impl TryFrom<String> for Sha {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Sha::from_hex(&value).ok_or_else(|| format!("invalid sha: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // sha1("") is well known
        assert_eq!(
            Sha::of("").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let sha = Sha::of("hello");
        assert_eq!(Sha::from_hex(&sha.to_hex()), Some(sha));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Sha::from_hex("abc").is_none());
        assert!(Sha::from_hex(&"zz".repeat(20)).is_none());
        assert!(Sha::from_hex(&"é".repeat(20)).is_none());
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let sha = Sha::of("body");
        let json = serde_json::to_string(&sha).unwrap();
        assert_eq!(json, format!("\"{}\"", sha.to_hex()));
        let back: Sha = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sha);
    }
}
