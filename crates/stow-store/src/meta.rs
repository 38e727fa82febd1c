//! Version history documents under `meta/`.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use stow_types::{ContentDigest, MetadataDocument, VersionRecord, VirtualPath, WeakDigest};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::layout::{split_path, Layout};
use crate::locks::PathLocks;
use crate::stager::TempGuard;

/// Reads, replaces, and appends to per-path version histories.
#[derive(Debug)]
pub struct MetadataStore {
    layout: Layout,
    locks: PathLocks,
}

impl MetadataStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            locks: PathLocks::new(),
        }
    }

    /// Load the history of `path`.
    ///
    /// Returns an empty document if nothing was ever written there. A file
    /// that exists but does not decode is [`StoreError::CorruptMetadata`].
    pub async fn load(&self, path: &VirtualPath) -> StoreResult<MetadataDocument> {
        let location = self.layout.meta_location(path);
        let bytes = match fs::read(&location).await {
            Ok(bytes) => bytes,
            Err(e) if self.is_absent(&location, &e).await => {
                return Ok(MetadataDocument::new());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptMetadata {
            path: location,
            reason: e.to_string(),
        })
    }

    /// Replace the history of `path` with `document`.
    ///
    /// The document is written to `temp/` and renamed into place, so after a
    /// crash either the previous or the new document is present. A save that
    /// fails or is cancelled before the rename removes its temp file.
    ///
    /// Does not take the path lock; see [`replace`](Self::replace).
    pub async fn save(&self, path: &VirtualPath, document: &MetadataDocument) -> StoreResult<()> {
        let location = self.layout.meta_location(path);
        let data =
            serde_json::to_vec(document).map_err(|e| StoreError::Serialization(e.to_string()))?;

        fs::create_dir_all(split_path(&location).dir_name).await?;
        fs::create_dir_all(self.layout.temp_root()).await?;

        let mut temp = TempGuard::new(self.layout.temp_location(None));
        let mut file = fs::File::create(temp.path()).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(temp.path(), &location).await?;
        temp.disarm();

        debug!(path = %path, records = document.len(), "saved metadata");
        Ok(())
    }

    /// [`save`](Self::save) under the path's lock, so a replacement never
    /// interleaves with an [`append`](Self::append) to the same path.
    pub async fn replace(&self, path: &VirtualPath, document: &MetadataDocument) -> StoreResult<()> {
        let _guard = self.locks.lock(path).await;
        self.save(path, document).await
    }

    /// Record a new version of `path` unless it matches the current one.
    ///
    /// Only the strong digest decides. Returns `true` if a record was
    /// appended. The whole load-append-save runs under the path's lock.
    pub async fn append(
        &self,
        path: &VirtualPath,
        weak: WeakDigest,
        strong: ContentDigest,
        created_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let _guard = self.locks.lock(path).await;

        let mut document = self.load(path).await?;
        let record = VersionRecord::new(weak, strong).with_created_at(created_at);
        let sha512 = record.strong.short_hex().to_string();

        if !document.push_if_changed(record) {
            debug!(path = %path, sha512 = %sha512, "content unchanged, history untouched");
            return Ok(false);
        }

        self.save(path, &document).await?;
        info!(path = %path, sha512 = %sha512, version = document.len(), "appended version");
        Ok(true)
    }

    /// Whether a read error on `location` just means "never written".
    ///
    /// Besides `NotFound`, a location is absent when it is a directory
    /// (only deeper paths were written) or when one of its ancestors is a
    /// document file.
    async fn is_absent(&self, location: &Path, error: &io::Error) -> bool {
        if error.kind() == io::ErrorKind::NotFound {
            return true;
        }
        if let Ok(meta) = fs::metadata(location).await {
            return meta.is_dir();
        }
        let root = self.layout.meta_root();
        for ancestor in location.ancestors().skip(1) {
            if ancestor == root {
                break;
            }
            if let Ok(meta) = fs::metadata(ancestor).await {
                return meta.is_file();
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use stow_crypto::DigestPair;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> MetadataStore {
        MetadataStore::new(Layout::new(dir.path()))
    }

    fn vp(raw: &str) -> VirtualPath {
        VirtualPath::parse(raw).unwrap()
    }

    fn temp_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("temp"))
            .map(|rd| rd.count())
            .unwrap_or(0)
    }

    fn digests(data: &[u8]) -> (WeakDigest, ContentDigest) {
        let d = DigestPair::digest(data);
        (d.weak, d.strong)
    }

    #[tokio::test]
    async fn missing_document_is_empty() {
        let dir = TempDir::new().unwrap();
        let doc = store(&dir).load(&vp("/caminho/do/arquivo1")).await.unwrap();
        assert!(doc.is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let path = vp("/caminho/do/arquivo2");
        let (weak, strong) = digests(b"funciona!");
        let doc = MetadataDocument::from(vec![VersionRecord::new(weak, strong)]);

        meta.save(&path, &doc).await.unwrap();
        assert_eq!(meta.load(&path).await.unwrap(), doc);
        assert!(dir.path().join("meta/caminho/do/arquivo2").is_file());
    }

    #[tokio::test]
    async fn save_replaces_previous_document() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let path = vp("replace/me");
        let (w1, s1) = digests(b"one");
        let (w2, s2) = digests(b"two");

        meta.save(&path, &vec![VersionRecord::new(w1, s1)].into())
            .await
            .unwrap();
        let second: MetadataDocument = vec![VersionRecord::new(w2, s2)].into();
        meta.save(&path, &second).await.unwrap();
        assert_eq!(meta.load(&path).await.unwrap(), second);

        // no stray temp documents
        let leftovers = std::fs::read_dir(dir.path().join("temp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn append_coalesces_repeats() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let path = vp("/caminho/do/arquivo3");
        let (w1, s1) = digests(b"conteudo 1 do arquivo\n");
        let (w2, s2) = digests(b"conteudo 2 do arquivo\n");
        let now = Utc::now();

        assert!(meta.append(&path, w1.clone(), s1.clone(), now).await.unwrap());
        assert!(!meta.append(&path, w1.clone(), s1.clone(), now).await.unwrap());
        assert!(meta.append(&path, w2, s2, now).await.unwrap());
        assert!(meta.append(&path, w1, s1.clone(), now).await.unwrap());

        let doc = meta.load(&path).await.unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.latest().unwrap().strong, s1);
        assert_eq!(doc.latest().unwrap().created_at, Some(now));
    }

    #[tokio::test]
    async fn concurrent_appends_keep_every_version() {
        let dir = TempDir::new().unwrap();
        let meta = std::sync::Arc::new(store(&dir));
        let path = vp("busy/path");

        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let meta = std::sync::Arc::clone(&meta);
                let path = path.clone();
                tokio::spawn(async move {
                    let (w, s) = digests(&[i; 4]);
                    meta.append(&path, w, s, Utc::now()).await.unwrap()
                })
            })
            .collect();
        for t in tasks {
            assert!(t.await.unwrap());
        }

        assert_eq!(meta.load(&path).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let location = dir.path().join("meta/broken");
        std::fs::create_dir_all(location.parent().unwrap()).unwrap();
        std::fs::write(&location, b"{not json").unwrap();

        let err = meta.load(&vp("broken")).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptMetadata { .. }));
    }

    #[tokio::test]
    async fn prefix_and_extension_paths_are_absent() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let (w, s) = digests(b"deep");
        meta.append(&vp("a/b"), w, s, Utc::now()).await.unwrap();

        // "a" is a directory holding "a/b"
        assert!(meta.load(&vp("a")).await.unwrap().is_empty());
        // "a/b" is a document, so "a/b/c" cannot exist
        assert!(meta.load(&vp("a/b/c")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let meta = store(&dir);
        let path = vp("cancel/me");
        let (w, s) = digests(b"half written");
        let doc: MetadataDocument = vec![VersionRecord::new(w, s)].into();

        // Stop the save after every possible number of polls until it completes.
        for polls in 1.. {
            let mut save = Box::pin(meta.save(&path, &doc));
            let mut finished = false;
            for _ in 0..polls {
                if futures::poll!(save.as_mut()).is_ready() {
                    finished = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            drop(save);
            assert_eq!(temp_count(&dir), 0, "temp file left after {polls} polls");
            if finished {
                break;
            }
        }
        assert_eq!(meta.load(&path).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn replace_waits_for_path_lock() {
        let dir = TempDir::new().unwrap();
        let meta = Arc::new(store(&dir));
        let path = vp("locked/doc");
        let (w, s) = digests(b"replacement");
        let doc: MetadataDocument = vec![VersionRecord::new(w, s)].into();

        let held = meta.locks.lock(&path).await;
        let task = {
            let meta = Arc::clone(&meta);
            let path = path.clone();
            let doc = doc.clone();
            tokio::spawn(async move { meta.replace(&path, &doc).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!dir.path().join("meta/locked/doc").exists());

        drop(held);
        task.await.unwrap().unwrap();
        assert_eq!(meta.load(&path).await.unwrap(), doc);
    }
}
