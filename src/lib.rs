//! # nuget-assembly
//!
//! Ingestion pipeline that pulls assemblies out of NuGet packages into a
//! content-addressed store.
//!
//! ## Pipeline
//!
//! - The [`catalog`] crawler follows the append-only package catalog from a
//!   saved cursor and publishes the download URL of every changed package.
//! - The [`queue`] publisher packs those URLs into size-bounded batches,
//!   learning the queue's per-message overhead as it goes.
//! - The [`extractor`] downloads a package and writes each `.dll` entry into
//!   the [`store`], keyed by the SHA-512 of its bytes.
//! - Fan-out work runs on the fixed-size, retrying [`pool`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use nuget_assembly::{App, Config, commands};
//! use nuget_assembly::package::PackageIdentity;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::new(Config::default())?;
//!     let cancel = CancellationToken::new();
//!     nuget_assembly::cancel_on_shutdown(cancel.clone());
//!
//!     let identity = PackageIdentity::new("Newtonsoft.Json", "13.0.1")?;
//!     let extractor = app.extractor_into(std::path::Path::new("out"));
//!     let summary =
//!         commands::extract_package(&app.package_source()?, &extractor, &identity, &cancel)
//!             .await?;
//!     println!("{summary:?}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Collaborator wiring from configuration
pub mod app;
/// Catalog feed crawling
pub mod catalog;
/// Operations behind the CLI subcommands
pub mod commands;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Assembly extraction from package archives
pub mod extractor;
/// Package identities and download source
pub mod package;
/// Fixed-concurrency retrying worker pool
pub mod pool;
/// Message queue and batch publishing
pub mod queue;
/// Per-item retry loop
pub mod retry;
/// Content-addressed blob storage
pub mod store;

// Re-export commonly used types
pub use app::App;
pub use catalog::{CatalogCrawler, CrawlSummary};
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, Error, ErrorClass, Result};
pub use extractor::{EntryFailurePolicy, ExtractSummary, PackageExtractor};
pub use pool::WorkerPool;
pub use queue::{BatchPublisher, PublishSummary};
pub use store::{ContentKey, ContentStore};

use tokio_util::sync::CancellationToken;

/// Cancel `cancel` when the process receives a termination signal.
///
/// Spawns a background task, so it must be called from inside a Tokio runtime.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Shutdown requested, cancelling in-flight work");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
