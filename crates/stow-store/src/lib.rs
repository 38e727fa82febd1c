//! Content-addressed, versioned storage for Stow.
//!
//! Clients write byte streams under a virtual path. Identical content is
//! stored once, keyed by its SHA-512 digest, and each virtual path keeps an
//! append-only history of the digests written to it.
//!
//! # Components
//!
//! - [`Layout`] -- pure mapping from digests and virtual paths to locations
//! - [`Stager`] -- streams an upload into `temp/` while digesting it
//! - [`ContentStore`] -- dedup-or-publish commit into `data/`
//! - [`MetadataStore`] -- per-path version history under `meta/`
//! - [`FileSystemBackend`] -- the [`StorageBackend`] facade over all of them
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: stage and digest, then publish, then record the version.
//! 3. Concurrent reads are always safe (blobs are immutable).
//! 4. History appends are serialized per path but parallel across paths.
//! 5. A failed or cancelled write leaves nothing behind in `temp/`.
//! 6. All I/O errors are propagated; only "never written" is swallowed.

pub mod backend;
pub mod content;
pub mod error;
pub mod layout;
pub mod locks;
pub mod meta;
pub mod stager;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::{BackendOptions, FileSystemBackend};
pub use content::{CommitOutcome, ContentStore};
pub use error::{StoreError, StoreResult};
pub use layout::{sanitize_digest, split_path, Layout, SplitPath};
pub use locks::{PathGuard, PathLocks};
pub use meta::MetadataStore;
pub use stager::{StagedObject, Stager};
pub use traits::{BlobReader, RetrieveOutcome, StorageBackend, StoreOutcome};
