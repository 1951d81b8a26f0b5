//! Size-bounded batch publishing with adaptive header estimation

use super::{MessageQueue, QueueMessage};
use crate::config::QueueConfig;
use crate::error::{Error, ErrorClass, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Totals for one publish run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Messages successfully enqueued
    pub messages: usize,
    /// Batches accepted by the queue
    pub batches: usize,
    /// Batches the queue rejected as too large and that were re-packed
    pub oversize_rejections: usize,
    /// Header estimate in effect when the run finished
    pub header_estimate: usize,
}

/// Greedy single-pass batch packer in front of a [`MessageQueue`]
///
/// The queue's real per-message overhead is unknown, so each message is
/// charged its payload size plus a header estimate. When the queue still
/// rejects a batch as too large the estimate grows by half (rounded up) and
/// the same range is packed again. The estimate never shrinks for the
/// lifetime of the publisher.
pub struct BatchPublisher {
    queue: Arc<dyn MessageQueue>,
    max_batch_bytes: usize,
    header_estimate: usize,
}

impl BatchPublisher {
    /// Create a publisher with an explicit ceiling and starting estimate
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        max_batch_bytes: usize,
        initial_header_estimate: usize,
    ) -> Self {
        Self {
            queue,
            max_batch_bytes,
            header_estimate: initial_header_estimate.max(1),
        }
    }

    /// Create a publisher from queue configuration
    pub fn from_config(queue: Arc<dyn MessageQueue>, config: &QueueConfig) -> Self {
        Self::new(
            queue,
            config.max_batch_bytes,
            config.initial_header_estimate_bytes,
        )
    }

    /// Current per-message header estimate
    pub fn header_estimate(&self) -> usize {
        self.header_estimate
    }

    /// Enqueue one message per URL, in order, then close the queue
    ///
    /// Batches are sent one at a time. The queue is closed only after every
    /// batch has been accepted; on any failure it is left open and the error
    /// is returned.
    pub async fn publish(
        &mut self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Result<PublishSummary> {
        let messages: Vec<QueueMessage> = urls.iter().map(|url| QueueMessage::from_url(url)).collect();
        let sizes: Vec<usize> = messages.iter().map(QueueMessage::size).collect();

        let mut summary = PublishSummary::default();
        let mut start = 0;

        while start < messages.len() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let end = find_batch_end(&sizes, start, self.header_estimate, self.max_batch_bytes);
            let batch = &messages[start..end];

            info!(messages = batch.len(), "Enqueueing batch of messages");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = self.queue.send_batch(batch) => result,
            };

            match result {
                Ok(()) => {
                    info!(messages = batch.len(), "Enqueued batch of messages");
                    summary.messages += batch.len();
                    summary.batches += 1;
                    start = end;
                }
                Err(e) if e.class() == ErrorClass::Oversize => {
                    if batch.len() == 1 {
                        return Err(Error::MessageTooLarge { size: sizes[start] });
                    }

                    self.grow_header_estimate()?;
                    summary.oversize_rejections += 1;
                    warn!(
                        error = %e,
                        estimated_header_bytes = self.header_estimate,
                        "Enqueued batch exceeded max message size, increased header size estimate"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            messages = summary.messages,
            batches = summary.batches,
            "Completed enqueueing messages"
        );
        self.queue.close().await?;

        summary.header_estimate = self.header_estimate;
        Ok(summary)
    }

    fn grow_header_estimate(&mut self) -> Result<()> {
        let grown = self.header_estimate.saturating_mul(3).div_ceil(2);
        if grown > self.max_batch_bytes {
            return Err(Error::HeaderEstimateDiverged {
                estimate: grown,
                ceiling: self.max_batch_bytes,
            });
        }
        self.header_estimate = grown;
        Ok(())
    }
}

/// Exclusive end of the batch starting at `start`
///
/// Extends the batch while the cumulative `size + header_estimate` of every
/// message in it, including the candidate, stays within `ceiling`. The batch
/// always holds at least one message, even one that alone exceeds the
/// ceiling.
pub fn find_batch_end(
    sizes: &[usize],
    start: usize,
    header_estimate: usize,
    ceiling: usize,
) -> usize {
    if start >= sizes.len() {
        return sizes.len();
    }

    let mut estimated = sizes[start].saturating_add(header_estimate);
    let mut end = start + 1;

    while end < sizes.len() {
        let next = estimated
            .saturating_add(sizes[end])
            .saturating_add(header_estimate);
        if next > ceiling {
            break;
        }
        estimated = next;
        end += 1;
    }

    end
}
