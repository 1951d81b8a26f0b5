//! HTTP transport for the package queue

use super::{MessageQueue, QueueMessage};
use crate::config::parse_url;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use url::Url;

/// Queue reached by POSTing JSON batches to an endpoint
///
/// Each batch is sent as `{"messages":[{"contentType":..,"body":..}]}`.
/// The endpoint signals an oversized batch with HTTP 413.
#[derive(Debug)]
pub struct HttpQueue {
    client: reqwest::Client,
    endpoint: Url,
    closed: AtomicBool,
}

#[derive(Serialize)]
struct WireBatch<'a> {
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage<'a> {
    content_type: &'a str,
    body: String,
}

impl HttpQueue {
    /// Create a queue client for `endpoint`
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: parse_url("queue.endpoint", endpoint)?,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MessageQueue for HttpQueue {
    async fn send_batch(&self, batch: &[QueueMessage]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Other("queue handle is closed".to_string()));
        }

        let wire = WireBatch {
            messages: batch
                .iter()
                .map(|message| WireMessage {
                    content_type: &message.content_type,
                    body: String::from_utf8_lossy(&message.body).into_owned(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&wire)
            .send()
            .await?;

        match response.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Err(Error::BatchTooLarge {
                messages: batch.len(),
                payload_bytes: batch.iter().map(QueueMessage::size).sum(),
            }),
            status if status.is_success() => Ok(()),
            status => Err(Error::Http {
                status: status.as_u16(),
                url: self.endpoint.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint, "queue handle closed");
        Ok(())
    }
}
