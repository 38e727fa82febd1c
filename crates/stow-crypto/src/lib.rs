//! Content digests for Stow.
//!
//! Every blob is identified by its SHA-512 digest. An MD5 digest is computed
//! in the same pass and recorded for compatibility only; it is never used to
//! decide content equality.
//!
//! All crypto operations wrap established libraries — no custom cryptography.

pub mod hasher;

pub use hasher::{is_empty_content, DigestPair, Digests, EMPTY_MD5, EMPTY_SHA512};
