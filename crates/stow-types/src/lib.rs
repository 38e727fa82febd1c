//! Foundation types for Stow.
//!
//! Stow is a content-addressed object store with a per-path version history.
//! This crate provides the identifiers and documents shared by the storage
//! engine and the HTTP surface.
//!
//! # Key Types
//!
//! - [`VirtualPath`] — Normalized client-chosen name for a versioned object
//! - [`ContentDigest`] — SHA-512 content identifier (canonical blob key)
//! - [`WeakDigest`] — MD5 digest carried for compatibility
//! - [`VersionRecord`] — One observed content state of a virtual path
//! - [`MetadataDocument`] — Append-only version history of a virtual path

pub mod digest;
pub mod error;
pub mod path;
pub mod version;

pub use digest::{ContentDigest, WeakDigest, STRONG_DIGEST_LEN, WEAK_DIGEST_LEN};
pub use error::TypeError;
pub use path::VirtualPath;
pub use version::{MetadataDocument, VersionRecord};
