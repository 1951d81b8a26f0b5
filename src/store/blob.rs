//! Re-readable temporary buffer for content on its way into a store

use super::ContentKey;
use crate::error::Result;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Bytes spooled to an anonymous temporary file
///
/// Content has to be read twice on the way into a store: once to compute its
/// key and once to write it. Network and archive streams are not seekable, so
/// they are buffered here first. The file is deleted by the OS when the blob
/// is dropped.
#[derive(Debug)]
pub struct TempBlob {
    file: File,
    len: u64,
}

impl TempBlob {
    /// Spool a blocking reader to a temporary file
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut file = tempfile::tempfile()?;
        let len = io::copy(reader, &mut file)?;
        file.flush()?;
        file.rewind()?;
        Ok(Self { file, len })
    }

    /// Spool an in-memory buffer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        Self::from_reader(&mut reader)
    }

    /// Spool an async reader (e.g. an HTTP response body) to a temporary file
    pub async fn from_async_reader<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> Result<Self> {
        let std_file = tokio::task::spawn_blocking(tempfile::tempfile).await??;
        let mut file = tokio::fs::File::from_std(std_file);
        let len = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;

        let mut file = file.into_std().await;
        file.rewind()?;
        Ok(Self { file, len })
    }

    /// Number of bytes buffered
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the blob holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hash the full contents, leaving the read position at the start
    pub fn content_key(&mut self) -> Result<ContentKey> {
        self.file.rewind()?;
        let mut hasher = Sha512::new();
        io::copy(&mut self.file, &mut hasher)?;
        self.file.rewind()?;
        Ok(ContentKey::from_digest(&hasher.finalize()))
    }

    /// Copy the full contents into `writer`
    pub fn copy_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64> {
        self.file.rewind()?;
        let copied = io::copy(&mut self.file, writer)?;
        Ok(copied)
    }

    /// Give up the buffer as a seekable file positioned at the start
    pub fn into_file(mut self) -> Result<File> {
        self.file.rewind()?;
        Ok(self.file)
    }
}
