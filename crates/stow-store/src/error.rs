use std::path::PathBuf;

use stow_types::{ContentDigest, TypeError};

/// Errors from storage backend operations.
///
/// Absence of a virtual path is not an error: it is reported as an empty
/// [`MetadataDocument`](stow_types::MetadataDocument) or `found: false`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Zero-length uploads are never stored.
    #[error("empty file")]
    EmptyContent,

    /// The upload exceeded the configured size limit.
    #[error("upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Metadata references a blob that is not on disk (store corruption).
    #[error("blob {0} referenced by metadata is missing")]
    MissingBlob(ContentDigest),

    /// A metadata document exists but cannot be decoded.
    #[error("corrupt metadata document {path}: {reason}")]
    CorruptMetadata { path: PathBuf, reason: String },

    /// The virtual path or digest supplied by the caller is malformed.
    #[error(transparent)]
    Invalid(#[from] TypeError),

    /// Serialization failure while writing a document.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
