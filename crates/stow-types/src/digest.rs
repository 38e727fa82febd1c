use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of a strong (SHA-512) digest.
pub const STRONG_DIGEST_LEN: usize = 64;

/// Length in bytes of a weak (MD5) digest.
pub const WEAK_DIGEST_LEN: usize = 16;

/// Strong content digest: lowercase hex SHA-512 of a blob.
///
/// This is the canonical blob identifier. Identical content always produces
/// the same `ContentDigest`, which is what makes blobs deduplicatable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Build a digest from the raw 64-byte hash output.
    pub fn from_hash(hash: [u8; STRONG_DIGEST_LEN]) -> Self {
        Self(hex::encode(hash))
    }

    /// Parse from a hex string. Upper-case input is accepted and lowercased.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        parse_hex(s, STRONG_DIGEST_LEN).map(Self)
    }

    /// Hex-encoded string representation.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> &str {
        &self.0[..8]
    }

    /// Two-character shard prefix used by the blob layout.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.short_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

/// Weak digest: lowercase hex MD5, kept for compatibility only.
///
/// Never used to decide whether two contents are equal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeakDigest(String);

impl WeakDigest {
    pub fn from_hash(hash: [u8; WEAK_DIGEST_LEN]) -> Self {
        Self(hex::encode(hash))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        parse_hex(s, WEAK_DIGEST_LEN).map(Self)
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WeakDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakDigest({})", self.0)
    }
}

impl fmt::Display for WeakDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WeakDigest {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<WeakDigest> for String {
    fn from(d: WeakDigest) -> Self {
        d.0
    }
}

fn parse_hex(s: &str, expected: usize) -> Result<String, TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != expected {
        return Err(TypeError::InvalidLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(s.to_ascii_lowercase())
}
