//! Configuration types for nuget-assembly

use crate::error::{Error, Result};
use crate::extractor::EntryFailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default number of concurrent workers in the worker pool
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Default number of retries per work item (total attempts = retries + 1)
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default ceiling for the estimated size of one queue batch
pub const DEFAULT_MAX_BATCH_BYTES: usize = 262_000;

/// Default starting estimate of per-message header overhead
pub const DEFAULT_HEADER_ESTIMATE_BYTES: usize = 100;

/// Main configuration for nuget-assembly
///
/// Every field has a sensible default, so an empty JSON object (`{}`) is a
/// valid configuration that crawls nuget.org into a local `assemblies/`
/// directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog feed and package source locations
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Message queue endpoint and batching limits
    #[serde(default)]
    pub queue: QueueConfig,

    /// Content store backing
    #[serde(default)]
    pub store: StoreConfig,

    /// Worker pool sizing and retry ceiling
    #[serde(default)]
    pub pool: PoolConfig,

    /// HTTP client settings shared by every transport
    #[serde(default)]
    pub http: HttpConfig,

    /// Data storage (cursor database)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Package extraction behavior
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config_file",
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

        let config: Config = serde_json::from_str(&content).map_err(|e| {
            Error::config(
                "config_file",
                format!("failed to parse {}: {}", path.display(), e),
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.pool.concurrency == 0 {
            return Err(Error::config("pool.concurrency", "must be at least 1"));
        }

        // Every pool worker may hold one connection per host
        if self.http.max_connections_per_host < self.pool.concurrency {
            return Err(Error::config(
                "http.max_connections_per_host",
                format!(
                    "must be at least pool.concurrency ({}), got {}",
                    self.pool.concurrency, self.http.max_connections_per_host
                ),
            ));
        }

        if self.queue.max_batch_bytes <= self.queue.initial_header_estimate_bytes {
            return Err(Error::config(
                "queue.max_batch_bytes",
                format!(
                    "must exceed queue.initial_header_estimate_bytes ({})",
                    self.queue.initial_header_estimate_bytes
                ),
            ));
        }

        if self.queue.initial_header_estimate_bytes == 0 {
            return Err(Error::config(
                "queue.initial_header_estimate_bytes",
                "must be at least 1",
            ));
        }

        if self.extraction.entry_suffix.is_empty() {
            return Err(Error::config("extraction.entry_suffix", "must not be empty"));
        }

        parse_url("catalog.index_url", &self.catalog.index_url)?;
        parse_url("catalog.package_base_url", &self.catalog.package_base_url)?;
        if let Some(endpoint) = &self.queue.endpoint {
            parse_url("queue.endpoint", endpoint)?;
        }
        if let StoreConfig::Http { base_url } = &self.store {
            parse_url("store.base_url", base_url)?;
        }

        Ok(())
    }
}

/// Parse a configured URL, reporting the offending key on failure
pub(crate) fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::config(key, format!("invalid URL {value:?}: {e}")))
}

/// Catalog feed configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Root index of the append-only catalog feed
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Base URL of the flat-container package source
    #[serde(default = "default_package_base_url")]
    pub package_base_url: String,

    /// Name of the cursor slot in the database (default: "catalog")
    #[serde(default = "default_cursor_name")]
    pub cursor_name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            package_base_url: default_package_base_url(),
            cursor_name: default_cursor_name(),
        }
    }
}

/// Message queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Endpoint accepting batches of messages (None = queue not configured)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Ceiling for the estimated byte size of one batch (default: 262000)
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Starting per-message header overhead estimate (default: 100)
    ///
    /// The estimate only grows during a publish run, each time the queue
    /// rejects a batch as too large.
    #[serde(default = "default_header_estimate_bytes")]
    pub initial_header_estimate_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_batch_bytes: default_max_batch_bytes(),
            initial_header_estimate_bytes: default_header_estimate_bytes(),
        }
    }
}

/// Content store backing selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Blobs stored under a local directory
    Filesystem {
        /// Root directory; blobs land in `<root>/SHA512/<key>`
        root: PathBuf,
    },
    /// Blobs stored in a remote object store addressed over HTTP
    Http {
        /// Container URL; blobs land at `<base_url>/SHA512/<key>`
        base_url: String,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Filesystem {
            root: PathBuf::from("assemblies"),
        }
    }
}

/// Worker pool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent workers (default: 32)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries per work item after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 100 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Idle connections kept per host; must cover the pool's concurrency
    #[serde(default = "default_max_connections_per_host")]
    pub max_connections_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
            max_connections_per_host: default_max_connections_per_host(),
        }
    }
}

impl HttpConfig {
    /// Build the shared HTTP client
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(self.max_connections_per_host)
            .gzip(true)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./nuget-assembly.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Package extraction configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Entry name suffix selecting which archive entries are stored (default: ".dll")
    #[serde(default = "default_entry_suffix")]
    pub entry_suffix: String,

    /// What to do when one entry of a package fails (default: abort the package)
    #[serde(default)]
    pub entry_failure_policy: EntryFailurePolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            entry_suffix: default_entry_suffix(),
            entry_failure_policy: EntryFailurePolicy::default(),
        }
    }
}

// Default value functions
fn default_index_url() -> String {
    "https://api.nuget.org/v3/catalog0/index.json".to_string()
}

fn default_package_base_url() -> String {
    "https://api.nuget.org/v3-flatcontainer".to_string()
}

fn default_cursor_name() -> String {
    "catalog".to_string()
}

fn default_max_batch_bytes() -> usize {
    DEFAULT_MAX_BATCH_BYTES
}

fn default_header_estimate_bytes() -> usize {
    DEFAULT_HEADER_ESTIMATE_BYTES
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(100)
}

fn default_user_agent() -> String {
    format!("nuget-assembly/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_connections_per_host() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_database_path() -> PathBuf {
    PathBuf::from("nuget-assembly.db")
}

fn default_entry_suffix() -> String {
    ".dll".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
