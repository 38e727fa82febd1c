use async_trait::async_trait;
use serde::Serialize;
use stow_types::{ContentDigest, MetadataDocument, VirtualPath};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::StoreResult;

/// Readable blob content returned by [`StorageBackend::open_latest`].
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Result of [`StorageBackend::store_data`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOutcome {
    /// The upload created a new blob (`false` on a dedup hit).
    pub new_file: bool,
    /// The upload appended a version to the path's history.
    pub updated: bool,
    pub strong_digest: ContentDigest,
}

/// Result of [`StorageBackend::retrieve_data`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveOutcome {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strong_digest: Option<ContentDigest>,
}

impl RetrieveOutcome {
    pub fn not_found() -> Self {
        Self {
            found: false,
            strong_digest: None,
        }
    }
}

/// Versioned, content-addressed storage backend.
///
/// All implementations must satisfy these invariants:
/// - At most one physical blob exists per strong digest.
/// - Blobs are immutable once committed; readers never see partial content.
/// - A path's history never holds two consecutive records of the same
///   content, and it never shrinks.
/// - A failed write leaves no temp object, blob, or history behind.
/// - A path that was never written is reported as absent, not as an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stream `input` into the store and record it as the latest version of
    /// `path`.
    async fn store_data(
        &self,
        path: &VirtualPath,
        input: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<StoreOutcome>;

    /// Replace the whole history of `path`.
    async fn store_meta(&self, path: &VirtualPath, document: &MetadataDocument)
        -> StoreResult<()>;

    /// The history of `path`; empty if it was never written.
    async fn retrieve_meta(&self, path: &VirtualPath) -> StoreResult<MetadataDocument>;

    /// Open the latest version of `path`, or `None` if it was never written.
    async fn open_latest(
        &self,
        path: &VirtualPath,
    ) -> StoreResult<Option<(ContentDigest, BlobReader)>>;

    /// Whether a blob with this digest is stored.
    ///
    /// Stray path separators are ignored; a string that is not a strong
    /// digest is reported as absent.
    async fn hash_exists(&self, digest: &str) -> StoreResult<bool>;

    /// Stream the latest version of `path` into `sink`.
    ///
    /// Default implementation copies from [`open_latest`](Self::open_latest).
    async fn retrieve_data(
        &self,
        path: &VirtualPath,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StoreResult<RetrieveOutcome> {
        let Some((digest, mut reader)) = self.open_latest(path).await? else {
            return Ok(RetrieveOutcome::not_found());
        };
        tokio::io::copy(&mut reader, sink).await?;
        sink.flush().await?;
        Ok(RetrieveOutcome {
            found: true,
            strong_digest: Some(digest),
        })
    }
}
