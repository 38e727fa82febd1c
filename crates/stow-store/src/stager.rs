//! Staging: copy an upload into `temp/` while digesting it.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use stow_crypto::{DigestPair, Digests};
use stow_types::{ContentDigest, WeakDigest};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::layout::{new_temp_id, Layout};

/// Read buffer size for the staging loop.
const CHUNK_SIZE: usize = 64 * 1024;

/// Owns a file under `temp/` and removes it when dropped.
///
/// Dropping happens on every early return and when a request future is
/// cancelled mid-upload, so a temp file never outlives its request.
#[derive(Debug)]
pub(crate) struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Stop tracking the file; it has been moved out of `temp/`.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    /// Remove the file now. Already-gone is not an error.
    async fn remove(&mut self) -> io::Result<()> {
        self.armed = false;
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), error = %e, "failed to remove temp object");
            }
            _ => debug!(path = %self.path.display(), "removed abandoned temp object"),
        }
    }
}

/// A fully written upload in `temp/`, with its digests.
///
/// Must be handed to [`ContentStore::commit`](crate::ContentStore::commit)
/// or [`discard`](Self::discard)ed; if it is simply dropped the temp file
/// is removed anyway.
#[derive(Debug)]
pub struct StagedObject {
    temp_id: String,
    guard: TempGuard,
    digests: Digests,
    staged_at: DateTime<Utc>,
}

impl StagedObject {
    pub fn temp_id(&self) -> &str {
        &self.temp_id
    }

    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    pub fn weak(&self) -> &WeakDigest {
        &self.digests.weak
    }

    pub fn strong(&self) -> &ContentDigest {
        &self.digests.strong
    }

    pub fn size(&self) -> u64 {
        self.digests.size
    }

    pub fn staged_at(&self) -> DateTime<Utc> {
        self.staged_at
    }

    /// Delete the temp file.
    pub async fn discard(mut self) -> StoreResult<()> {
        self.guard.remove().await?;
        Ok(())
    }
}

/// Writes uploads to uniquely named temp files in one streaming pass.
#[derive(Clone, Debug)]
pub struct Stager {
    layout: Layout,
    max_size: Option<u64>,
}

impl Stager {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            max_size: None,
        }
    }

    /// Reject uploads larger than `limit` bytes.
    pub fn with_max_size(mut self, limit: Option<u64>) -> Self {
        self.max_size = limit;
        self
    }

    /// Consume `input` to EOF into a new temp file.
    ///
    /// Every chunk is written to the file and fed to both digests before the
    /// next read, so memory use is bounded by the chunk size. Empty input is
    /// accepted. On any error the partial temp file is removed.
    pub async fn stage<R>(&self, input: &mut R) -> StoreResult<StagedObject>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        fs::create_dir_all(self.layout.temp_root()).await?;

        let temp_id = new_temp_id();
        let path = self.layout.temp_location(Some(&temp_id));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let guard = TempGuard::new(path);

        let mut digests = DigestPair::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if let Some(limit) = self.max_size {
                if digests.size() + n as u64 > limit {
                    return Err(StoreError::TooLarge { limit });
                }
            }
            let chunk = &buf[..n];
            file.write_all(chunk).await?;
            digests.update(chunk);
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let digests = digests.finalize();
        debug!(
            temp_id = %temp_id,
            size = digests.size,
            sha512 = digests.strong.short_hex(),
            "staged upload"
        );

        Ok(StagedObject {
            temp_id,
            guard,
            digests,
            staged_at: Utc::now(),
        })
    }
}
