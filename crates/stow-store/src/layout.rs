//! Physical layout of a store root.
//!
//! ```text
//! <root>/data/<first 2 hex chars>/<digest>   immutable blobs
//! <root>/meta/<virtual path segments>        version history documents
//! <root>/temp/<32 hex chars>                 in-flight uploads
//! ```
//!
//! Everything here is pure path arithmetic; no function touches the
//! filesystem.

use std::path::{Path, PathBuf};

use rand::RngCore;
use stow_types::VirtualPath;

const DATA_DIR: &str = "data";
const META_DIR: &str = "meta";
const TEMP_DIR: &str = "temp";

/// Random bytes behind a generated temp id.
const TEMP_ID_BYTES: usize = 16;

/// Maps digests and virtual paths to locations under a store root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

/// Structural decomposition of a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPath {
    pub full: PathBuf,
    pub dir_name: PathBuf,
    pub base_name: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_root(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn meta_root(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// `<root>/data/<d[0:2]>/<d>` for a hex digest string.
    ///
    /// Stray separators are stripped from `digest` first.
    pub fn data_location(&self, digest: &str) -> PathBuf {
        let digest = sanitize_digest(digest);
        let shard: String = digest.chars().take(2).collect();
        self.data_root().join(shard).join(&digest)
    }

    /// `<root>/meta/<segments...>` for a normalized virtual path.
    pub fn meta_location(&self, path: &VirtualPath) -> PathBuf {
        let mut location = self.meta_root();
        location.extend(path.segments());
        location
    }

    /// `<root>/temp/<id>`, generating a fresh random id when none is given.
    pub fn temp_location(&self, id: Option<&str>) -> PathBuf {
        match id {
            Some(id) if !id.is_empty() => self.temp_root().join(id),
            _ => self.temp_root().join(new_temp_id()),
        }
    }
}

/// Generate an unguessable temp id: 16 random bytes, hex-encoded.
pub fn new_temp_id() -> String {
    let mut bytes = [0u8; TEMP_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Remove `/` and `\` from a client-supplied digest string.
pub fn sanitize_digest(digest: &str) -> String {
    digest.chars().filter(|c| *c != '/' && *c != '\\').collect()
}

/// Split `path` into itself, its parent directory, and its final component.
pub fn split_path(path: &Path) -> SplitPath {
    SplitPath {
        full: path.to_path_buf(),
        dir_name: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        base_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
