//! Remote object-store backing for the content store

use super::{ContentKey, ContentStore, HASH_ALGORITHM_DIR, PutOutcome, TempBlob};
use crate::config::parse_url;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, IF_NONE_MATCH};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

/// Content store backed by an HTTP object store container
///
/// Blobs are addressed as `<base_url>/SHA512/<key>`. Uploads use a
/// conditional `PUT` (`If-None-Match: *`); the store answers 409 or 412 when
/// the blob is already there, which counts as success.
#[derive(Clone, Debug)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    /// Create a store for the container at `base_url`
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        parse_url("store.base_url", base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the blob for `key`
    pub fn url_for(&self, key: &ContentKey) -> Result<Url> {
        let raw = format!("{}/{}/{}", self.base_url, HASH_ALGORITHM_DIR, key);
        parse_url("store.base_url", &raw)
    }
}

#[async_trait]
impl ContentStore for HttpBlobStore {
    async fn get_or_none(&self, key: &ContentKey) -> Result<Option<Vec<u8>>> {
        let url = self.url_for(key)?;
        let response = self.client.get(url.clone()).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(%url, "no content at url");
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn put(&self, blob: TempBlob) -> Result<PutOutcome> {
        let (key, blob) = tokio::task::spawn_blocking(move || {
            let mut blob = blob;
            blob.content_key().map(|key| (key, blob))
        })
        .await??;

        let url = self.url_for(&key)?;
        let len = blob.len();
        let file = tokio::fs::File::from_std(blob.into_file()?);
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        info!(%url, bytes = len, "Saving content at url");
        let response = self
            .client
            .put(url.clone())
            .header(IF_NONE_MATCH, "*")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                debug!(%url, "Content already exists at url");
                Ok(PutOutcome::AlreadyExists(key))
            }
            status if status.is_success() => Ok(PutOutcome::Created(key)),
            status => Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}
