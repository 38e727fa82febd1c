//! Hash-addressed blob storage under `data/`.

use std::io;
use std::path::Path;

use stow_crypto::is_empty_content;
use stow_types::ContentDigest;
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::layout::{split_path, Layout};
use crate::stager::StagedObject;

/// Result of committing a staged upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    /// `true` if this commit created the blob, `false` on a dedup hit.
    pub new_file: bool,
}

/// Decides new-vs-duplicate for staged uploads and publishes new blobs.
///
/// A blob path either does not exist or holds the complete content: blobs
/// are published with a single link/rename from `temp/` and never modified
/// afterwards.
#[derive(Clone, Debug)]
pub struct ContentStore {
    layout: Layout,
}

impl ContentStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Commit a staged upload to `data/<shard>/<digest>`.
    ///
    /// Empty content is refused with [`StoreError::EmptyContent`]. When the
    /// blob already exists the temp file is discarded and `new_file` is
    /// `false`. A concurrent writer publishing the same digest first is
    /// treated exactly like a pre-existing blob.
    pub async fn commit(&self, staged: StagedObject) -> StoreResult<CommitOutcome> {
        if is_empty_content(staged.strong()) {
            staged.discard().await?;
            return Err(StoreError::EmptyContent);
        }

        let digest = staged.strong().clone();
        let dest = self.layout.data_location(digest.as_hex());

        if fs::try_exists(&dest).await? {
            debug!(sha512 = digest.short_hex(), "dedup hit, discarding temp object");
            staged.discard().await?;
            return Ok(CommitOutcome { new_file: false });
        }

        fs::create_dir_all(split_path(&dest).dir_name).await?;

        let new_file = match publish(staged.path(), &dest).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(sha512 = digest.short_hex(), "lost publish race, discarding temp object");
                false
            }
            Err(e) => return Err(e.into()),
        };
        staged.discard().await?;

        if new_file {
            debug!(sha512 = digest.short_hex(), path = %dest.display(), "committed blob");
        }
        Ok(CommitOutcome { new_file })
    }

    /// Open a blob for reading.
    ///
    /// A missing blob is [`StoreError::MissingBlob`]: callers only ask for
    /// digests that metadata says exist.
    pub async fn open(&self, digest: &ContentDigest) -> StoreResult<File> {
        let path = self.layout.data_location(digest.as_hex());
        match File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::MissingBlob(digest.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stream a blob into `sink`. Returns the number of bytes copied.
    pub async fn retrieve<W>(&self, digest: &ContentDigest, sink: &mut W) -> StoreResult<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut file = self.open(digest).await?;
        let copied = tokio::io::copy(&mut file, sink).await?;
        sink.flush().await?;
        Ok(copied)
    }

    /// Whether a blob with this digest is stored.
    pub async fn exists(&self, digest: &ContentDigest) -> StoreResult<bool> {
        let path = self.layout.data_location(digest.as_hex());
        Ok(fs::try_exists(&path).await?)
    }
}

/// Make `src` visible at `dest` without ever exposing a partial file.
///
/// A hard link fails with `AlreadyExists` if `dest` is populated, so of two
/// racing writers exactly one wins. Filesystems without hard links fall
/// back to rename, which atomically replaces `dest` with identical bytes.
async fn publish(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::hard_link(src, dest).await {
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
            ) =>
        {
            debug!(error = %e, "hard link unavailable, falling back to rename");
            fs::rename(src, dest).await
        }
        other => other,
    }
}
