use sha2::{Digest as _, Sha512};
use stow_types::{ContentDigest, WeakDigest, STRONG_DIGEST_LEN};

/// MD5 of the empty byte sequence.
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// SHA-512 of the empty byte sequence.
pub const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

/// Finalized digests of one byte stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digests {
    pub weak: WeakDigest,
    pub strong: ContentDigest,
    /// Number of bytes hashed.
    pub size: u64,
}

/// Running weak + strong digest over a stream fed chunk by chunk.
///
/// Both accumulators see exactly the same bytes in the same order, so a
/// single read loop can write a chunk to disk and hash it before asking for
/// the next one.
pub struct DigestPair {
    weak: md5::Context,
    strong: Sha512,
    size: u64,
}

impl DigestPair {
    pub fn new() -> Self {
        Self {
            weak: md5::Context::new(),
            strong: Sha512::new(),
            size: 0,
        }
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.weak.consume(chunk);
        self.strong.update(chunk);
        self.size += chunk.len() as u64;
    }

    /// Bytes fed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> Digests {
        let weak = WeakDigest::from_hash(self.weak.compute().0);
        let mut strong = [0u8; STRONG_DIGEST_LEN];
        strong.copy_from_slice(&self.strong.finalize());
        Digests {
            weak,
            strong: ContentDigest::from_hash(strong),
            size: self.size,
        }
    }

    /// Digest an in-memory buffer in one call.
    pub fn digest(data: &[u8]) -> Digests {
        let mut pair = Self::new();
        pair.update(data);
        pair.finalize()
    }
}

impl Default for DigestPair {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DigestPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestPair").field("size", &self.size).finish()
    }
}

/// Returns `true` if `strong` is the digest of the empty byte sequence.
pub fn is_empty_content(strong: &ContentDigest) -> bool {
    strong.as_hex() == EMPTY_SHA512
}
