//! HTTP access to catalog documents

use super::{CatalogClient, CatalogIndex, CatalogPage};
use crate::config::parse_url;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Catalog client reading JSON documents over HTTP
#[derive(Clone, Debug)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    index_url: Url,
}

impl HttpCatalogClient {
    /// Create a client for the catalog rooted at `index_url`
    pub fn new(client: reqwest::Client, index_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            index_url: parse_url("catalog.index_url", index_url)?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!(%url, bytes = body.len(), "fetched catalog document");
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidCatalog(format!("{url}: {e}")))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_index(&self) -> Result<CatalogIndex> {
        self.get_json(self.index_url.clone()).await
    }

    async fn fetch_page(&self, url: &str) -> Result<CatalogPage> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidCatalog(format!("bad page URL {url:?}: {e}")))?;
        self.get_json(url).await
    }
}
