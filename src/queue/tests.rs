use super::*;
use crate::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

enum Behavior {
    AcceptAll,
    RejectFirstAsTooLarge,
    /// Reject any batch whose real size (payload + true header per message) exceeds `limit`
    WireLimit { true_header: usize, limit: usize },
    /// Accept `n` batches, then fail with a server error
    FailAfter(usize),
    AlwaysTooLarge,
}

struct FakeQueue {
    behavior: Behavior,
    attempts: Mutex<Vec<Vec<String>>>,
    accepted: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeQueue {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            attempts: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn attempts(&self) -> Vec<Vec<String>> {
        self.attempts.lock().unwrap().clone()
    }

    fn accepted(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageQueue for FakeQueue {
    async fn send_batch(&self, batch: &[QueueMessage]) -> crate::Result<()> {
        let urls: Vec<String> = batch
            .iter()
            .map(|m| String::from_utf8(m.body.clone()).unwrap())
            .collect();
        let attempt_number = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(urls.clone());
            attempts.len()
        };

        let too_large = Error::BatchTooLarge {
            messages: batch.len(),
            payload_bytes: batch.iter().map(QueueMessage::size).sum(),
        };

        match self.behavior {
            Behavior::AcceptAll => {}
            Behavior::RejectFirstAsTooLarge if attempt_number == 1 => return Err(too_large),
            Behavior::RejectFirstAsTooLarge => {}
            Behavior::WireLimit { true_header, limit } => {
                let wire: usize = batch.iter().map(|m| m.size() + true_header).sum();
                if wire > limit {
                    return Err(too_large);
                }
            }
            Behavior::FailAfter(n) if attempt_number > n => {
                return Err(Error::Http {
                    status: 500,
                    url: "http://queue.test/packages".to_string(),
                });
            }
            Behavior::FailAfter(_) => {}
            Behavior::AlwaysTooLarge => return Err(too_large),
        }

        self.accepted.lock().unwrap().extend(urls);
        Ok(())
    }

    async fn close(&self) -> crate::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// URL of exactly 100 bytes
fn url_100(i: usize) -> String {
    let url = format!("https://example.test/{i:0>79}");
    assert_eq!(url.len(), 100);
    url
}

#[tokio::test]
async fn one_rejection_grows_default_estimate_to_150_and_resends_same_range() {
    let queue = FakeQueue::new(Behavior::RejectFirstAsTooLarge);
    let mut publisher = BatchPublisher::new(queue.clone(), 262_000, 100);
    let urls: Vec<String> = (0..3).map(url_100).collect();

    let summary = publisher
        .publish(&urls, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(publisher.header_estimate(), 150);
    let attempts = queue.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], urls);
    assert_eq!(attempts[1], urls);
    assert_eq!(
        summary,
        PublishSummary {
            messages: 3,
            batches: 1,
            oversize_rejections: 1,
            header_estimate: 150,
        }
    );
    assert!(queue.is_closed());
}

#[tokio::test]
async fn estimate_converges_on_the_real_header_size() {
    let queue = FakeQueue::new(Behavior::WireLimit {
        true_header: 130,
        limit: 1_000,
    });
    let mut publisher = BatchPublisher::new(queue.clone(), 1_000, 20);
    let urls: Vec<String> = (0..20).map(url_100).collect();

    let summary = publisher
        .publish(&urls, &CancellationToken::new())
        .await
        .unwrap();

    // 20 -> 30 -> 45 -> 68 -> 102, after which 4 messages (808 estimated, 920 real) fit
    assert_eq!(summary.oversize_rejections, 4);
    assert_eq!(summary.header_estimate, 102);
    assert_eq!(summary.batches, 5);
    assert_eq!(queue.accepted(), urls, "every URL enqueued once, in order");

    let attempted_sizes: Vec<usize> = queue.attempts().iter().map(Vec::len).collect();
    assert_eq!(attempted_sizes, vec![8, 7, 6, 5, 4, 4, 4, 4, 4]);
    assert!(queue.is_closed());
}

#[tokio::test]
async fn queue_is_not_closed_when_a_batch_fails() {
    let queue = FakeQueue::new(Behavior::FailAfter(1));
    // Two 100-byte messages per batch
    let mut publisher = BatchPublisher::new(queue.clone(), 250, 20);
    let urls: Vec<String> = (0..6).map(url_100).collect();

    let result = publisher.publish(&urls, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::Http { status: 500, .. })));
    assert_eq!(queue.accepted(), urls[..2].to_vec());
    assert!(!queue.is_closed());
}

#[tokio::test]
async fn single_message_rejected_as_too_large_is_fatal() {
    let queue = FakeQueue::new(Behavior::AlwaysTooLarge);
    let mut publisher = BatchPublisher::new(queue.clone(), 262_000, 100);
    let urls = vec![url_100(1)];

    let result = publisher.publish(&urls, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::MessageTooLarge { size: 100 })));
    assert_eq!(publisher.header_estimate(), 100, "nothing left to shrink");
    assert!(!queue.is_closed());
}

#[tokio::test]
async fn repeated_rejections_shrink_batches_until_one_message_remains() {
    let queue = FakeQueue::new(Behavior::AlwaysTooLarge);
    let mut publisher = BatchPublisher::new(queue.clone(), 1_000, 20);
    let urls: Vec<String> = (0..10).map(url_100).collect();

    let result = publisher.publish(&urls, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
    let sizes: Vec<usize> = queue.attempts().iter().map(Vec::len).collect();
    assert!(
        sizes.windows(2).all(|pair| pair[1] <= pair[0]),
        "batch sizes must never grow: {sizes:?}"
    );
    assert_eq!(sizes.last(), Some(&1));
    assert!(publisher.header_estimate() > 20);
}

#[tokio::test]
async fn empty_input_sends_nothing_and_closes() {
    let queue = FakeQueue::new(Behavior::AcceptAll);
    let mut publisher = BatchPublisher::new(queue.clone(), 262_000, 100);

    let summary = publisher
        .publish(&[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.messages, 0);
    assert!(queue.attempts().is_empty());
    assert!(queue.is_closed());
}

#[tokio::test]
async fn cancelled_publish_sends_nothing() {
    let queue = FakeQueue::new(Behavior::AcceptAll);
    let mut publisher = BatchPublisher::new(queue.clone(), 262_000, 100);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = publisher.publish(&[url_100(0)], &cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(queue.attempts().is_empty());
    assert!(!queue.is_closed());
}

#[test]
fn message_from_url_is_utf8_with_declared_content_type() {
    let message = QueueMessage::from_url("https://api.nuget.org/v3-flatcontainer/a/1.0.0/a.1.0.0.nupkg");
    assert_eq!(message.size(), 60);
    assert_eq!(message.content_type, "application/json;charset=unicode");
}

#[tokio::test]
async fn http_queue_posts_json_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queues/packages"))
        .and(body_json(serde_json::json!({
            "messages": [
                {"contentType": "application/json;charset=unicode", "body": "https://a.test/x.nupkg"}
            ]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let queue = HttpQueue::new(
        reqwest::Client::new(),
        &format!("{}/queues/packages", server.uri()),
    )
    .unwrap();

    queue
        .send_batch(&[QueueMessage::from_url("https://a.test/x.nupkg")])
        .await
        .unwrap();
}

#[tokio::test]
async fn http_queue_maps_413_to_batch_too_large() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let queue = HttpQueue::new(reqwest::Client::new(), &server.uri()).unwrap();
    let batch = [
        QueueMessage::from_url("https://a.test/1"),
        QueueMessage::from_url("https://a.test/22"),
    ];

    let result = queue.send_batch(&batch).await;
    assert!(matches!(
        result,
        Err(Error::BatchTooLarge {
            messages: 2,
            payload_bytes: 33
        })
    ));
}

#[tokio::test]
async fn http_queue_rejects_sends_after_close() {
    let server = MockServer::start().await;
    let queue = HttpQueue::new(reqwest::Client::new(), &server.uri()).unwrap();

    queue.close().await.unwrap();
    let result = queue
        .send_batch(&[QueueMessage::from_url("https://a.test/1")])
        .await;

    assert!(matches!(result, Err(Error::Other(_))));
}

#[tokio::test]
async fn publisher_recovers_from_http_413() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let queue = Arc::new(HttpQueue::new(reqwest::Client::new(), &server.uri()).unwrap());
    let mut publisher = BatchPublisher::new(queue, 262_000, 100);
    let urls = vec![url_100(0), url_100(1)];

    let summary = publisher
        .publish(&urls, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.oversize_rejections, 1);
    assert_eq!(summary.messages, 2);
    assert_eq!(publisher.header_estimate(), 150);
}
