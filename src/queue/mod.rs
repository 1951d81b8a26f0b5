//! Package work queue
//!
//! Package download URLs are published to a message queue in batches whose
//! estimated size stays under the queue's per-call limit. The queue itself is
//! an external collaborator behind [`MessageQueue`]; [`BatchPublisher`] owns
//! the packing and the adaptive header-size correction.

use crate::error::Result;
use async_trait::async_trait;

mod http;
mod publisher;

pub use http::HttpQueue;
pub use publisher::{BatchPublisher, PublishSummary, find_batch_end};

/// Content type declared on every package URL message
pub const PACKAGE_URL_CONTENT_TYPE: &str = "application/json;charset=unicode";

/// One message bound for the queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    /// Raw payload
    pub body: Vec<u8>,
    /// Declared content type
    pub content_type: String,
}

impl QueueMessage {
    /// Message carrying a package download URL as UTF-8
    pub fn from_url(url: &str) -> Self {
        Self {
            body: url.as_bytes().to_vec(),
            content_type: PACKAGE_URL_CONTENT_TYPE.to_string(),
        }
    }

    /// Payload size in bytes, used for batch packing
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// A queue accepting batches of messages
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Send one batch
    ///
    /// Must fail with [`crate::Error::BatchTooLarge`] when the provider rejects
    /// the batch for exceeding its size limit, so the publisher can shrink
    /// subsequent batches.
    async fn send_batch(&self, batch: &[QueueMessage]) -> Result<()>;

    /// Release the queue handle once every batch has been sent
    async fn close(&self) -> Result<()>;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
