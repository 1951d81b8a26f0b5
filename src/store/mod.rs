//! Content-addressed blob storage
//!
//! Blobs are keyed by the lowercase hex SHA-512 digest of their bytes and
//! stored under `SHA512/<key>`. Writes are create-if-absent: storing bytes
//! that already exist is a no-op, including when several workers race to
//! store the same content.
//!
//! Two backings share the [`ContentStore`] contract:
//! - [`FilesystemStore`]: a local directory
//! - [`HttpBlobStore`]: a remote object store addressed over HTTP

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;

mod blob;
mod filesystem;
mod http;

pub use blob::TempBlob;
pub use filesystem::FilesystemStore;
pub use http::HttpBlobStore;

/// Directory (or path prefix) naming the hash algorithm behind every key
pub const HASH_ALGORITHM_DIR: &str = "SHA512";

/// Length of a hex-encoded SHA-512 digest
const KEY_LEN: usize = 128;

/// Lowercase hex SHA-512 digest identifying a blob
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    /// Parse a hex digest, accepting either case
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != KEY_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidContentKey(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Build a key from a finished digest
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        let mut hex = String::with_capacity(KEY_LEN);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage location relative to the store root: `SHA512/<key>`
    pub fn relative_path(&self) -> String {
        format!("{}/{}", HASH_ALGORITHM_DIR, self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a create-if-absent write
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// This call stored the blob
    Created(ContentKey),
    /// The blob was already present; nothing was written
    AlreadyExists(ContentKey),
}

impl PutOutcome {
    /// Key of the blob, whichever way the write resolved
    pub fn key(&self) -> &ContentKey {
        match self {
            PutOutcome::Created(key) | PutOutcome::AlreadyExists(key) => key,
        }
    }

    /// Whether this call actually wrote the blob
    pub fn was_created(&self) -> bool {
        matches!(self, PutOutcome::Created(_))
    }
}

/// Idempotent content-addressed persistence
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch a blob, or `None` if no blob is stored under `key`
    async fn get_or_none(&self, key: &ContentKey) -> Result<Option<Vec<u8>>>;

    /// Hash the blob and store it unless a blob with that key already exists
    ///
    /// "Already exists" is a successful outcome, never an error.
    async fn put(&self, blob: TempBlob) -> Result<PutOutcome>;
}
