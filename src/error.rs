//! Error types for nuget-assembly
//!
//! This module provides the crate-wide error type plus a classification of
//! every variant into the pipeline's failure taxonomy:
//! - **Transient** failures are retried by the worker pool
//! - **Oversize** rejections are absorbed by the batch publisher
//! - **Fatal** failures abort the run and leave the catalog cursor untouched
//!
//! "Not found" (absent package, absent blob) is not an error.
//! Collaborators report it as `Ok(None)`.

use thiserror::Error;

/// Result type alias for nuget-assembly operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nuget-assembly
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pool.concurrency")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Package archive could not be read
    #[error("package archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A remote endpoint answered with an unexpected HTTP status
    #[error("unexpected HTTP {status} from {url}")]
    Http {
        /// HTTP status code returned by the remote endpoint
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Catalog document was malformed or inconsistent
    #[error("invalid catalog document: {0}")]
    InvalidCatalog(String),

    /// A string was not a valid content key
    #[error("invalid content key: {0}")]
    InvalidContentKey(String),

    /// A package version could not be normalized
    #[error("invalid package version: {0}")]
    InvalidVersion(String),

    /// The queue rejected a batch because its real wire size exceeded the limit
    #[error("queue rejected batch of {messages} messages ({payload_bytes} payload bytes) as too large")]
    BatchTooLarge {
        /// Number of messages in the rejected batch
        messages: usize,
        /// Sum of the message payload sizes, excluding headers
        payload_bytes: usize,
    },

    /// A single message is too large for the queue on its own
    #[error("message of {size} bytes cannot be enqueued: rejected even as a batch of one")]
    MessageTooLarge {
        /// Payload size of the message in bytes
        size: usize,
    },

    /// The adaptive header estimate grew past the batch ceiling without converging
    #[error("header size estimate {estimate} exceeds batch ceiling {ceiling}")]
    HeaderEstimateDiverged {
        /// The estimate that would have been used next
        estimate: usize,
        /// The configured batch ceiling in bytes
        ceiling: usize,
    },

    /// A work item failed on every attempt
    #[error("work item failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Total number of attempts made (initial attempt plus retries)
        attempts: u32,
        /// The error from the final attempt
        #[source]
        source: Box<Error>,
    },

    /// Operation was cancelled by the shared cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// A blocking task panicked or was aborted
    #[error("background task failed: {0}")]
    TaskPanicked(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be decoded
    #[error("corrupt stored value: {0}")]
    CorruptValue(String),
}

/// Where a failure sits in the pipeline's failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network or storage failure during a single work item; worth retrying
    Transient,
    /// Queue rejected a batch as too large; handled by shrinking batches
    Oversize,
    /// Unrecoverable for this run
    Fatal,
}

impl Error {
    /// Classify this error for retry and reporting decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Network(_) | Error::Io(_) | Error::Http { .. } | Error::Zip(_) => {
                ErrorClass::Transient
            }
            // A catalog page can be read while it is still being written
            Error::InvalidCatalog(_) | Error::Serialization(_) => ErrorClass::Transient,
            Error::BatchTooLarge { .. } => ErrorClass::Oversize,
            Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::InvalidContentKey(_)
            | Error::InvalidVersion(_)
            | Error::MessageTooLarge { .. }
            | Error::HeaderEstimateDiverged { .. }
            | Error::RetriesExhausted { .. }
            | Error::Cancelled
            | Error::TaskPanicked(_)
            | Error::Other(_) => ErrorClass::Fatal,
        }
    }

    /// Machine-readable error code used in structured log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Zip(_) => "archive_error",
            Error::Http { .. } => "http_status",
            Error::InvalidCatalog(_) => "invalid_catalog",
            Error::InvalidContentKey(_) => "invalid_content_key",
            Error::InvalidVersion(_) => "invalid_version",
            Error::BatchTooLarge { .. } => "batch_too_large",
            Error::MessageTooLarge { .. } => "message_too_large",
            Error::HeaderEstimateDiverged { .. } => "header_estimate_diverged",
            Error::RetriesExhausted { .. } => "retries_exhausted",
            Error::Cancelled => "cancelled",
            Error::TaskPanicked(_) => "task_panicked",
            Error::Other(_) => "internal_error",
        }
    }

    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::TaskPanicked(e.to_string())
    }
}
