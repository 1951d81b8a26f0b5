//! Explicit collaborator wiring
//!
//! [`App`] is built once from a validated [`Config`] and hands out the
//! concrete stores, queues and clients each command needs. Nothing is looked
//! up globally; commands receive their collaborators as arguments.

use crate::catalog::{CatalogCrawler, HttpCatalogClient};
use crate::config::{Config, StoreConfig};
use crate::db::{Database, DatabaseCursor};
use crate::error::{Error, Result};
use crate::extractor::PackageExtractor;
use crate::package::HttpPackageSource;
use crate::pool::WorkerPool;
use crate::queue::{BatchPublisher, HttpQueue};
use crate::store::{ContentStore, FilesystemStore, HttpBlobStore};
use std::path::Path;
use std::sync::Arc;

/// Collaborators shared by every command
pub struct App {
    config: Config,
    http: reqwest::Client,
    pool: WorkerPool,
}

impl App {
    /// Validate `config` and build the shared HTTP client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = config.http.build_client()?;
        let pool = WorkerPool::from_config(&config.pool);

        Ok(Self { config, http, pool })
    }

    /// The configuration this app was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Worker pool sized from `pool` configuration
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Content store selected by `store` configuration
    pub fn content_store(&self) -> Result<Arc<dyn ContentStore>> {
        let store: Arc<dyn ContentStore> = match &self.config.store {
            StoreConfig::Filesystem { root } => Arc::new(FilesystemStore::new(root.clone())),
            StoreConfig::Http { base_url } => {
                Arc::new(HttpBlobStore::new(self.http.clone(), base_url)?)
            }
        };
        Ok(store)
    }

    /// Extractor writing into `store` with the configured suffix and policy
    pub fn extractor(&self, store: Arc<dyn ContentStore>) -> PackageExtractor {
        PackageExtractor::from_config(store, &self.config.extraction)
    }

    /// Extractor writing into a local directory, regardless of `store` configuration
    pub fn extractor_into(&self, output_dir: &Path) -> PackageExtractor {
        self.extractor(Arc::new(FilesystemStore::new(output_dir)))
    }

    /// Flat-container package source
    pub fn package_source(&self) -> Result<HttpPackageSource> {
        HttpPackageSource::new(self.http.clone(), &self.config.catalog.package_base_url)
    }

    /// Batch publisher over the configured queue endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `queue.endpoint` is not set.
    pub fn publisher(&self) -> Result<BatchPublisher> {
        let endpoint = self
            .config
            .queue
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("queue.endpoint", "a queue endpoint is required"))?;
        let queue = HttpQueue::new(self.http.clone(), endpoint)?;

        Ok(BatchPublisher::from_config(Arc::new(queue), &self.config.queue))
    }

    /// Open the cursor database
    pub async fn database(&self) -> Result<Arc<Database>> {
        let db = Database::new(&self.config.persistence.database_path).await?;
        Ok(Arc::new(db))
    }

    /// Catalog crawler reading the configured feed and saving its cursor in `db`
    pub fn crawler(&self, db: Arc<Database>) -> Result<CatalogCrawler> {
        let client = HttpCatalogClient::new(self.http.clone(), &self.config.catalog.index_url)?;
        let cursor = DatabaseCursor::new(db, self.config.catalog.cursor_name.clone());

        Ok(CatalogCrawler::new(
            Arc::new(client),
            Arc::new(cursor),
            self.pool.clone(),
            self.config.catalog.package_base_url.clone(),
        ))
    }
}
