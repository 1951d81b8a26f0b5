//! Operations behind each CLI subcommand
//!
//! Every command takes its collaborators explicitly (see [`crate::app::App`]
//! for how the binary builds them) plus the shared cancellation token.

use crate::catalog::{CatalogCrawler, CrawlSummary};
use crate::error::{Error, Result};
use crate::extractor::{ExtractSummary, PackageExtractor};
use crate::package::{PackageIdentity, PackageSource};
use crate::pool::WorkerPool;
use crate::queue::{BatchPublisher, PublishSummary};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Totals for a multi-package extraction run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractManySummary {
    /// Packages downloaded and extracted
    pub packages: usize,
    /// Package URLs that answered "not found"
    pub missing: usize,
    /// Assemblies newly written to the store
    pub created: usize,
    /// Assemblies that were already stored
    pub already_present: usize,
    /// Entries skipped after failing under the skip policy
    pub failed: usize,
}

impl ExtractManySummary {
    fn add(&mut self, outcome: Option<ExtractSummary>) {
        match outcome {
            Some(summary) => {
                self.packages += 1;
                self.created += summary.created;
                self.already_present += summary.already_present;
                self.failed += summary.failed;
            }
            None => self.missing += 1,
        }
    }
}

/// Download the package at `url` and store its assemblies
///
/// A package that does not exist is logged and reported as `Ok(None)`; the
/// caller decides whether that matters.
pub async fn process_package_url(
    source: &dyn PackageSource,
    extractor: &PackageExtractor,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Option<ExtractSummary>> {
    info!(url, "Processing package");

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        fetched = source.fetch_or_none(url) => fetched?,
    };

    let Some(package) = fetched else {
        error!(url, "Package not found");
        return Ok(None);
    };

    let summary = extractor.extract(package, cancel).await?;
    info!(
        url,
        matched = summary.matched,
        created = summary.created,
        already_present = summary.already_present,
        "Package extracted"
    );
    Ok(Some(summary))
}

/// Resolve `identity` against the package source and extract it
pub async fn extract_package(
    source: &dyn PackageSource,
    extractor: &PackageExtractor,
    identity: &PackageIdentity,
    cancel: &CancellationToken,
) -> Result<Option<ExtractSummary>> {
    let url = source.package_url(identity);
    info!(package = %identity, url = %url, "Resolved package");
    process_package_url(source, extractor, &url, cancel).await
}

/// Extract many packages through the worker pool
///
/// Each URL is one work item; a package that fails every attempt aborts the
/// whole run.
pub async fn extract_packages(
    pool: &WorkerPool,
    source: Arc<dyn PackageSource>,
    extractor: Arc<PackageExtractor>,
    urls: Vec<String>,
    cancel: &CancellationToken,
) -> Result<ExtractManySummary> {
    let worker_cancel = cancel.clone();
    let outcomes = pool
        .run(urls, cancel, move |url: String| {
            let source = source.clone();
            let extractor = extractor.clone();
            let cancel = worker_cancel.clone();
            async move { process_package_url(source.as_ref(), &extractor, &url, &cancel).await }
        })
        .await?;

    let mut summary = ExtractManySummary::default();
    for outcome in outcomes {
        summary.add(outcome);
    }

    info!(
        packages = summary.packages,
        missing = summary.missing,
        created = summary.created,
        already_present = summary.already_present,
        "Extraction run complete"
    );
    Ok(summary)
}

/// Publish the download URL of one package
pub async fn queue_package(
    publisher: &mut BatchPublisher,
    package_base_url: &str,
    identity: &PackageIdentity,
    cancel: &CancellationToken,
) -> Result<PublishSummary> {
    let url = identity.flat_container_url(package_base_url);
    info!(package = %identity, url = %url, "Queueing package");
    publisher.publish(&[url], cancel).await
}

/// Run one catalog crawl
pub async fn crawl(
    crawler: &CatalogCrawler,
    publisher: &mut BatchPublisher,
    cancel: &CancellationToken,
) -> Result<CrawlSummary> {
    let summary = crawler.run(publisher, cancel).await?;
    info!(
        pages = summary.pages_fetched,
        packages = summary.packages,
        batches = summary.publish.batches,
        cursor = %summary.cursor,
        "Crawl complete"
    );
    Ok(summary)
}
