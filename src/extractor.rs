//! Assembly extraction from package archives
//!
//! A package is a zip archive. Entries whose name ends with the configured
//! suffix (`.dll` by default, matched case-sensitively) are copied one at a
//! time into a temporary buffer and written through the [`ContentStore`].
//! Entries are never processed in parallel within a package.

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::store::{ContentKey, ContentStore, PutOutcome, TempBlob};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

/// What to do when one matching entry cannot be stored
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFailurePolicy {
    /// Stop processing the package and report the failure
    #[default]
    Abort,
    /// Log the failure and continue with the next entry
    Skip,
}

/// Outcome of extracting one package
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Entries whose name matched the suffix
    pub matched: usize,
    /// Entries newly written to the store
    pub created: usize,
    /// Entries whose content was already stored
    pub already_present: usize,
    /// Entries that failed under [`EntryFailurePolicy::Skip`]
    pub failed: usize,
    /// Keys of every stored entry, in archive order
    pub keys: Vec<ContentKey>,
}

/// Pulls matching entries out of package archives into a content store
pub struct PackageExtractor {
    store: Arc<dyn ContentStore>,
    entry_suffix: String,
    policy: EntryFailurePolicy,
}

impl PackageExtractor {
    /// Create an extractor writing to `store`
    pub fn new(
        store: Arc<dyn ContentStore>,
        entry_suffix: impl Into<String>,
        policy: EntryFailurePolicy,
    ) -> Self {
        Self {
            store,
            entry_suffix: entry_suffix.into(),
            policy,
        }
    }

    /// Create an extractor from extraction configuration
    pub fn from_config(store: Arc<dyn ContentStore>, config: &ExtractionConfig) -> Self {
        Self::new(store, config.entry_suffix.clone(), config.entry_failure_policy)
    }

    /// Store every matching entry of `package`
    pub async fn extract(
        &self,
        package: TempBlob,
        cancel: &CancellationToken,
    ) -> Result<ExtractSummary> {
        let file = package.into_file()?;
        let suffix = self.entry_suffix.clone();
        let (mut archive, entries) =
            tokio::task::spawn_blocking(move || list_matching_entries(file, &suffix)).await??;

        debug!(matched = entries.len(), suffix = %self.entry_suffix, "listed package entries");
        let mut summary = ExtractSummary {
            matched: entries.len(),
            ..ExtractSummary::default()
        };

        for (index, name) in entries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            info!(entry = %name, "Extracting entry");
            let (returned, buffered) = tokio::task::spawn_blocking(move || {
                let buffered = buffer_entry(&mut archive, index);
                (archive, buffered)
            })
            .await?;
            archive = returned;

            let stored = match buffered {
                Ok(blob) => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    stored = self.store.put(blob) => stored,
                },
                Err(e) => Err(e),
            };

            match stored {
                Ok(outcome) => {
                    match &outcome {
                        PutOutcome::Created(_) => summary.created += 1,
                        PutOutcome::AlreadyExists(_) => summary.already_present += 1,
                    }
                    summary.keys.push(outcome.key().clone());
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => match self.policy {
                    EntryFailurePolicy::Abort => {
                        error!(entry = %name, error = %e, "Failed to extract entry, aborting package");
                        return Err(e);
                    }
                    EntryFailurePolicy::Skip => {
                        warn!(entry = %name, error = %e, "Failed to extract entry, skipping");
                        summary.failed += 1;
                    }
                },
            }
        }

        Ok(summary)
    }
}

/// Open the archive and find matching file entries in archive order
fn list_matching_entries(
    file: File,
    suffix: &str,
) -> Result<(ZipArchive<File>, Vec<(usize, String)>)> {
    let mut archive = ZipArchive::new(file)?;
    let mut entries = Vec::new();

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_file() && entry.name().ends_with(suffix) {
            entries.push((index, entry.name().to_string()));
        }
    }

    Ok((archive, entries))
}

fn buffer_entry(archive: &mut ZipArchive<File>, index: usize) -> Result<TempBlob> {
    let mut entry = archive.by_index(index)?;
    TempBlob::from_reader(&mut entry)
}
