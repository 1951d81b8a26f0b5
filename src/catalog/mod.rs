//! Incremental catalog crawling
//!
//! The catalog is an append-only feed: a root index lists pages, each page
//! lists leaf items, and every document carries a commit timestamp. A crawl
//! resumes after a saved cursor, fetches only pages committed after it, keeps
//! the latest leaf per package, publishes download URLs for the survivors,
//! and only then advances the cursor.
//!
//! ## Submodules
//!
//! - [`client`]: HTTP access to catalog documents
//! - [`dedup`]: latest-leaf-per-package reduction
//! - [`crawler`]: the crawl state machine

use crate::error::Result;
use crate::package::{PackageIdentity, flat_container_url};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod client;
pub mod crawler;
pub mod dedup;

pub use client::HttpCatalogClient;
pub use crawler::{CatalogCrawler, CrawlSummary};
pub use dedup::latest_published;

/// Root index of the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogIndex {
    /// Commit timestamp of the newest page
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,
    /// Every page of the catalog
    #[serde(default)]
    pub items: Vec<CatalogPageRef>,
}

/// Index entry pointing at one page
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogPageRef {
    /// Page document URL
    #[serde(rename = "@id")]
    pub url: String,
    /// Newest commit timestamp of any leaf in the page
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,
}

/// One page of leaf items
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Leaf items in the page
    #[serde(default)]
    pub items: Vec<CatalogLeafItem>,
}

/// Kind of event a leaf records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafKind {
    /// A package version was published or its metadata edited
    #[serde(rename = "nuget:PackageDetails")]
    Details,
    /// A package version was deleted
    #[serde(rename = "nuget:PackageDelete")]
    Delete,
}

/// One catalog event for one package version
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogLeafItem {
    /// Leaf document URL
    #[serde(rename = "@id")]
    pub url: String,
    /// Event kind
    #[serde(rename = "@type")]
    pub kind: LeafKind,
    /// When the event was committed to the catalog
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: DateTime<Utc>,
    /// Package id as published
    #[serde(rename = "nuget:id")]
    pub package_id: String,
    /// Package version as published
    #[serde(rename = "nuget:version")]
    pub package_version: String,
    /// Page the leaf was read from (filled in by the crawler)
    #[serde(skip)]
    pub page_url: String,
}

impl CatalogLeafItem {
    /// Whether this leaf records a deletion
    pub fn is_delete(&self) -> bool {
        self.kind == LeafKind::Delete
    }

    /// Case-insensitive `(id, normalized version)` identity
    ///
    /// Versions that cannot be normalized are compared by their lowercased
    /// raw text.
    pub fn identity_key(&self) -> (String, String) {
        match PackageIdentity::new(&self.package_id, &self.package_version) {
            Ok(identity) => identity.key(),
            Err(e) => {
                warn!(
                    id = %self.package_id,
                    version = %self.package_version,
                    error = %e,
                    "catalog leaf has a non-normalizable version"
                );
                (
                    self.package_id.trim().to_lowercase(),
                    self.package_version.trim().to_lowercase(),
                )
            }
        }
    }

    /// Flat-container download URL of the package this leaf describes
    pub fn package_url(&self, base_url: &str) -> String {
        let (id, version) = self.identity_key();
        flat_container_url(base_url, &id, &version)
    }
}

/// Read access to catalog documents
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch the root index
    async fn fetch_index(&self) -> Result<CatalogIndex>;

    /// Fetch one page by URL
    async fn fetch_page(&self, url: &str) -> Result<CatalogPage>;
}

/// Single-slot persistent crawl cursor
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Saved cursor, or `None` if no crawl has completed yet
    async fn load(&self) -> Result<Option<DateTime<Utc>>>;

    /// Replace the saved cursor
    async fn save(&self, value: DateTime<Utc>) -> Result<()>;
}
