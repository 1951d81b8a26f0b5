//! Local directory backing for the content store

use super::{ContentKey, ContentStore, HASH_ALGORITHM_DIR, PutOutcome, TempBlob};
use crate::error::Result;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Content store rooted at a local directory
///
/// Blobs land at `<root>/SHA512/<key>`. Each write is staged in a uniquely
/// named file inside the same directory and then linked into place without
/// replacing an existing file, so concurrent writers of the same content
/// resolve to one winner while the rest observe "already exists".
#[derive(Clone, Debug)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of the blob for `key`
    pub fn path_for(&self, key: &ContentKey) -> PathBuf {
        self.root.join(HASH_ALGORITHM_DIR).join(key.as_str())
    }
}

#[async_trait]
impl ContentStore for FilesystemStore {
    async fn get_or_none(&self, key: &ContentKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no content at path");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, blob: TempBlob) -> Result<PutOutcome> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || write_if_absent(&root, blob)).await?
    }
}

fn write_if_absent(root: &Path, mut blob: TempBlob) -> Result<PutOutcome> {
    let key = blob.content_key()?;
    let dir = root.join(HASH_ALGORITHM_DIR);
    let target = dir.join(key.as_str());

    if target.try_exists()? {
        debug!(path = %target.display(), "Content already exists at path");
        return Ok(PutOutcome::AlreadyExists(key));
    }

    std::fs::create_dir_all(&dir)?;

    info!(path = %target.display(), bytes = blob.len(), "Saving content at path");
    let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
    blob.copy_to(staging.as_file_mut())?;
    staging.as_file().sync_all()?;

    match staging.persist_noclobber(&target) {
        Ok(_) => Ok(PutOutcome::Created(key)),
        // Lost the race to a concurrent writer of identical bytes
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %target.display(), "Content already exists at path");
            Ok(PutOutcome::AlreadyExists(key))
        }
        Err(e) => Err(e.error.into()),
    }
}
