//! The crawl state machine
//!
//! `load cursor -> fetch index -> fetch pages (worker pool) -> collect ->
//! deduplicate -> publish -> save cursor`. There is no partial-success end
//! state: any failure before the final step leaves the saved cursor exactly
//! as it was, so the next run re-processes the same window.

use super::{CatalogClient, CatalogLeafItem, CatalogPageRef, CursorStore, latest_published};
use crate::error::Result;
use crate::pool::WorkerPool;
use crate::queue::{BatchPublisher, PublishSummary};
use crate::retry::run_with_retries;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Totals for one crawl run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Cursor before the run (`None` on the first crawl)
    pub previous_cursor: Option<DateTime<Utc>>,
    /// Cursor saved at the end of the run
    pub cursor: DateTime<Utc>,
    /// Pages fetched because they were committed after the cursor
    pub pages_fetched: usize,
    /// Pages skipped without fetching
    pub pages_skipped: usize,
    /// Leaves newer than the cursor, before deduplication
    pub leaves_collected: usize,
    /// Package URLs handed to the publisher
    pub packages: usize,
    /// Publisher totals
    pub publish: PublishSummary,
}

/// Incremental catalog crawler
pub struct CatalogCrawler {
    client: Arc<dyn CatalogClient>,
    cursor: Arc<dyn CursorStore>,
    pool: WorkerPool,
    package_base_url: String,
}

impl CatalogCrawler {
    /// Create a crawler
    ///
    /// `package_base_url` is the flat container that surviving leaves are
    /// turned into download URLs under.
    pub fn new(
        client: Arc<dyn CatalogClient>,
        cursor: Arc<dyn CursorStore>,
        pool: WorkerPool,
        package_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            cursor,
            pool,
            package_base_url: package_base_url.into(),
        }
    }

    /// Run one crawl, publishing every package changed since the saved cursor
    ///
    /// The cursor is written once, after `publisher` reports that every
    /// message was sent. Its new value is the index's commit timestamp, or
    /// the saved value if that is later.
    pub async fn run(
        &self,
        publisher: &mut BatchPublisher,
        cancel: &CancellationToken,
    ) -> Result<CrawlSummary> {
        let previous_cursor = self.cursor.load().await?;
        let since = previous_cursor.unwrap_or(DateTime::<Utc>::MIN_UTC);
        info!(cursor = ?previous_cursor, "Loaded catalog cursor");

        let index = run_with_retries(self.pool.max_retries(), cancel, || {
            self.client.fetch_index()
        })
        .await?;

        let total_pages = index.items.len();
        let pages: Vec<CatalogPageRef> = index
            .items
            .iter()
            .filter(|page| page.commit_timestamp > since)
            .cloned()
            .collect();
        let pages_fetched = pages.len();
        info!(
            pages = pages_fetched,
            skipped = total_pages - pages_fetched,
            index_commit = %index.commit_timestamp,
            "Fetching catalog pages"
        );

        let leaves = self.collect_leaves(pages, since, cancel).await?;
        let leaves_collected = leaves.len();

        let latest = latest_published(leaves);
        let urls: Vec<String> = latest
            .iter()
            .map(|leaf| leaf.package_url(&self.package_base_url))
            .collect();
        info!(
            leaves = leaves_collected,
            packages = urls.len(),
            "Deduplicated catalog leaves"
        );

        let publish = publisher.publish(&urls, cancel).await?;

        let cursor = match previous_cursor {
            Some(saved) if saved > index.commit_timestamp => saved,
            _ => index.commit_timestamp,
        };
        self.cursor.save(cursor).await?;
        info!(cursor = %cursor, packages = urls.len(), "Saved catalog cursor");

        Ok(CrawlSummary {
            previous_cursor,
            cursor,
            pages_fetched,
            pages_skipped: total_pages - pages_fetched,
            leaves_collected,
            packages: urls.len(),
            publish,
        })
    }

    /// Fetch pages through the worker pool, keeping leaves committed after `since`
    async fn collect_leaves(
        &self,
        pages: Vec<CatalogPageRef>,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogLeafItem>> {
        let client = self.client.clone();

        let per_page = self
            .pool
            .run(pages, cancel, move |page: CatalogPageRef| {
                let client = client.clone();
                async move {
                    let document = client.fetch_page(&page.url).await?;
                    let leaves: Vec<CatalogLeafItem> = document
                        .items
                        .into_iter()
                        .filter(|leaf| leaf.commit_timestamp > since)
                        .map(|mut leaf| {
                            leaf.page_url = page.url.clone();
                            leaf
                        })
                        .collect();
                    Ok(leaves)
                }
            })
            .await?;

        Ok(per_page.into_iter().flatten().collect())
    }
}
