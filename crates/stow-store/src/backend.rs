use std::path::PathBuf;

use async_trait::async_trait;
use stow_types::{ContentDigest, MetadataDocument, VirtualPath};
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::content::ContentStore;
use crate::error::StoreResult;
use crate::layout::{sanitize_digest, Layout};
use crate::meta::MetadataStore;
use crate::stager::Stager;
use crate::traits::{BlobReader, StorageBackend, StoreOutcome};

/// Tunables for a [`FileSystemBackend`].
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// Reject uploads larger than this many bytes.
    pub max_upload_size: Option<u64>,
}

/// Storage backend rooted at one directory of the local filesystem.
///
/// Write path: [`Stager`] → [`ContentStore::commit`] →
/// [`MetadataStore::append`]. Read path: [`MetadataStore::load`] →
/// [`ContentStore::open`]. Construct once and share behind an `Arc`.
#[derive(Debug)]
pub struct FileSystemBackend {
    layout: Layout,
    stager: Stager,
    content: ContentStore,
    meta: MetadataStore,
}

impl FileSystemBackend {
    /// Open (or create) a store at `root`.
    pub async fn open(root: impl Into<PathBuf>, options: BackendOptions) -> StoreResult<Self> {
        let layout = Layout::new(root);
        for dir in [layout.data_root(), layout.meta_root(), layout.temp_root()] {
            fs::create_dir_all(&dir).await?;
        }
        debug!(root = %layout.root().display(), "opened filesystem backend");

        Ok(Self {
            stager: Stager::new(layout.clone()).with_max_size(options.max_upload_size),
            content: ContentStore::new(layout.clone()),
            meta: MetadataStore::new(layout.clone()),
            layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    async fn store_data(
        &self,
        path: &VirtualPath,
        input: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<StoreOutcome> {
        let staged = self.stager.stage(input).await?;
        let weak = staged.weak().clone();
        let strong = staged.strong().clone();
        let staged_at = staged.staged_at();

        let commit = self.content.commit(staged).await?;
        let updated = self
            .meta
            .append(path, weak, strong.clone(), staged_at)
            .await?;

        Ok(StoreOutcome {
            new_file: commit.new_file,
            updated,
            strong_digest: strong,
        })
    }

    async fn store_meta(&self, path: &VirtualPath, document: &MetadataDocument) -> StoreResult<()> {
        self.meta.replace(path, document).await
    }

    async fn retrieve_meta(&self, path: &VirtualPath) -> StoreResult<MetadataDocument> {
        self.meta.load(path).await
    }

    async fn open_latest(
        &self,
        path: &VirtualPath,
    ) -> StoreResult<Option<(ContentDigest, BlobReader)>> {
        let document = self.meta.load(path).await?;
        let Some(latest) = document.latest() else {
            return Ok(None);
        };
        let file = self.content.open(&latest.strong).await?;
        Ok(Some((latest.strong.clone(), Box::new(file))))
    }

    async fn hash_exists(&self, digest: &str) -> StoreResult<bool> {
        match ContentDigest::from_hex(&sanitize_digest(digest)) {
            Ok(digest) => self.content.exists(&digest).await,
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::Arc;
    use stow_crypto::DigestPair;
    use tempfile::TempDir;

    async fn backend(dir: &TempDir) -> FileSystemBackend {
        FileSystemBackend::open(dir.path(), BackendOptions::default())
            .await
            .unwrap()
    }

    fn vp(raw: &str) -> VirtualPath {
        VirtualPath::parse(raw).unwrap()
    }

    async fn put(b: &FileSystemBackend, path: &str, data: &[u8]) -> StoreResult<StoreOutcome> {
        let mut input = data;
        b.store_data(&vp(path), &mut input).await
    }

    async fn get(b: &FileSystemBackend, path: &str) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let outcome = b.retrieve_data(&vp(path), &mut out).await.unwrap();
        outcome.found.then_some(out)
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let mut n = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                n += count_files(&entry.path());
            } else {
                n += 1;
            }
        }
        n
    }

    #[tokio::test]
    async fn open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("meta").is_dir());
        assert!(dir.path().join("temp").is_dir());
        assert_eq!(b.layout().root(), dir.path());
    }

    #[tokio::test]
    async fn storing_same_content_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;

        let first = put(&b, "/caminho/do/arquivo3", b"conteudo 1 do arquivo\n").await.unwrap();
        assert!(first.new_file);
        assert!(first.updated);

        let second = put(&b, "/caminho/do/arquivo3", b"conteudo 1 do arquivo\n").await.unwrap();
        assert!(!second.new_file);
        assert!(!second.updated);
        assert_eq!(first.strong_digest, second.strong_digest);
    }

    #[tokio::test]
    async fn change_detection_a_b_a() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        let path = "/caminho/do/arquivo3";

        let a1 = put(&b, path, b"conteudo 1 do arquivo\n").await.unwrap();
        let b1 = put(&b, path, b"conteudo 2 do arquivo\n").await.unwrap();
        let a2 = put(&b, path, b"conteudo 1 do arquivo\n").await.unwrap();

        assert_eq!((a1.new_file, a1.updated), (true, true));
        assert_eq!((b1.new_file, b1.updated), (true, true));
        assert_eq!((a2.new_file, a2.updated), (false, true));

        let history = b.retrieve_meta(&vp(path)).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(get(&b, path).await.unwrap(), b"conteudo 1 do arquivo\n");
    }

    #[tokio::test]
    async fn round_trip_various_sizes() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        for size in [1usize, 2, 63, 64, 65, 4096, 65_535, 65_536, 65_537, 300_001] {
            let data: Vec<u8> = (0..size).map(|i| (i * 31 % 256) as u8).collect();
            let path = format!("sizes/{size}");
            put(&b, &path, &data).await.unwrap();
            assert_eq!(get(&b, &path).await.unwrap(), data, "size {size}");
        }
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;

        let err = put(&b, "empty/file", b"").await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyContent));
        assert!(b.retrieve_meta(&vp("empty/file")).await.unwrap().is_empty());
        assert_eq!(count_files(&dir.path().join("temp")), 0);
        assert_eq!(count_files(&dir.path().join("data")), 0);
        assert_eq!(count_files(&dir.path().join("meta")), 0);
    }

    #[tokio::test]
    async fn never_written_path_is_absent() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;

        let mut out = Vec::new();
        let outcome = b.retrieve_data(&vp("/caminho/do/arquivo5"), &mut out).await.unwrap();
        assert!(!outcome.found);
        assert!(outcome.strong_digest.is_none());
        assert!(out.is_empty());
        assert!(b.retrieve_meta(&vp("/caminho/do/arquivo5")).await.unwrap().is_empty());
        assert!(b.open_latest(&vp("/caminho/do/arquivo5")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retrieve_reports_digest() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        let stored = put(&b, "/caminho/do/arquivo4", b"conteudo 4 do arquivo 4\n").await.unwrap();

        let mut out = Vec::new();
        let outcome = b.retrieve_data(&vp("caminho/do/arquivo4"), &mut out).await.unwrap();
        assert!(outcome.found);
        assert_eq!(outcome.strong_digest, Some(stored.strong_digest));
        assert_eq!(out, b"conteudo 4 do arquivo 4\n");
    }

    #[tokio::test]
    async fn same_content_under_two_paths_shares_one_blob() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;

        let first = put(&b, "one/path", b"shared bytes").await.unwrap();
        let second = put(&b, "another/path", b"shared bytes").await.unwrap();
        assert!(first.new_file);
        assert!(!second.new_file);
        assert!(second.updated);

        assert_eq!(count_files(&dir.path().join("data")), 1);
        let one = b.retrieve_meta(&vp("one/path")).await.unwrap();
        let another = b.retrieve_meta(&vp("another/path")).await.unwrap();
        assert_eq!(one.latest().unwrap().strong, another.latest().unwrap().strong);
    }

    #[tokio::test]
    async fn missing_blob_behind_metadata_is_an_error() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        let stored = put(&b, "doomed", b"will vanish").await.unwrap();
        std::fs::remove_file(b.layout().data_location(stored.strong_digest.as_hex())).unwrap();

        let mut out = Vec::new();
        let err = b.retrieve_data(&vp("doomed"), &mut out).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingBlob(_)));
    }

    #[tokio::test]
    async fn hash_exists_checks_blobs() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        let stored = put(&b, "x", b"probe me").await.unwrap();
        let hex = stored.strong_digest.as_hex();

        assert!(b.hash_exists(hex).await.unwrap());
        assert!(b.hash_exists(&format!("/{hex}/")).await.unwrap());
        assert!(b.hash_exists(&hex.to_uppercase()).await.unwrap());
        assert!(!b
            .hash_exists(DigestPair::digest(b"absent").strong.as_hex())
            .await
            .unwrap());
        assert!(!b.hash_exists("abcdef0123456789").await.unwrap());
        assert!(!b.hash_exists("../../etc/passwd").await.unwrap());
    }

    #[tokio::test]
    async fn store_meta_replaces_history() {
        let dir = TempDir::new().unwrap();
        let b = backend(&dir).await;
        put(&b, "rewritten", b"v1").await.unwrap();
        b.store_meta(&vp("rewritten"), &MetadataDocument::new()).await.unwrap();
        assert!(b.retrieve_meta(&vp("rewritten")).await.unwrap().is_empty());
        assert!(get(&b, "rewritten").await.is_none());
    }

    #[tokio::test]
    async fn upload_limit_applies() {
        let dir = TempDir::new().unwrap();
        let b = FileSystemBackend::open(
            dir.path(),
            BackendOptions {
                max_upload_size: Some(4),
            },
        )
        .await
        .unwrap();
        let err = put(&b, "big", b"too big").await.unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { limit: 4 }));
        assert!(b.retrieve_meta(&vp("big")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_writers_to_one_path_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let b = Arc::new(backend(&dir).await);

        let tasks: Vec<_> = (0..6u8)
            .map(|i| {
                let b = Arc::clone(&b);
                tokio::spawn(async move {
                    let data = vec![i + 1; 32];
                    let mut input: &[u8] = &data;
                    b.store_data(&vp("contended"), &mut input).await.unwrap()
                })
            })
            .collect();
        for t in tasks {
            assert!(t.await.unwrap().updated);
        }
        assert_eq!(b.retrieve_meta(&vp("contended")).await.unwrap().len(), 6);
    }
}
