//! End-to-end pipeline tests against a mock catalog, flat container and queue
//!
//! A crawl publishes package URLs to the queue endpoint; the URLs the queue
//! received are then extracted into the filesystem content store, exactly as
//! a queue consumer would.

mod common;

use chrono::{DateTime, Utc};
use common::*;
use nuget_assembly::{App, commands};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

/// Mount a two-page catalog and the packages it references
async fn mount_catalog(server: &MockServer) {
    let page0 = format!("{}/v3/catalog0/page0.json", server.uri());
    let page1 = format!("{}/v3/catalog0/page1.json", server.uri());

    serve_json(
        server,
        INDEX_PATH,
        index_document(
            "2023-01-01T00:00:20Z",
            &[
                (page0.clone(), "2023-01-01T00:00:10Z"),
                (page1.clone(), "2023-01-01T00:00:20Z"),
            ],
        ),
    )
    .await;
    serve_json(
        server,
        "/v3/catalog0/page0.json",
        page_document(
            &page0,
            &[
                ("Alpha", "1.0", "2023-01-01T00:00:05Z", false),
                ("Beta", "2.0.0", "2023-01-01T00:00:10Z", false),
            ],
        ),
    )
    .await;
    serve_json(
        server,
        "/v3/catalog0/page1.json",
        page_document(
            &page1,
            &[
                ("Beta", "2.0.0", "2023-01-01T00:00:15Z", true),
                ("Alpha", "1.0.0", "2023-01-01T00:00:18Z", false),
                ("Gamma", "3.0.0-RC", "2023-01-01T00:00:19.5Z", false),
            ],
        ),
    )
    .await;

    serve_package(
        server,
        "/v3-flatcontainer/alpha/1.0.0/alpha.1.0.0.nupkg",
        &[("lib/net45/Alpha.dll", "alpha"), ("Alpha.nuspec", "<package/>")],
    )
    .await;
    serve_package(
        server,
        "/v3-flatcontainer/gamma/3.0.0-rc/gamma.3.0.0-rc.nupkg",
        &[("lib/Gamma.dll", "gamma"), ("lib/Shared.dll", "alpha")],
    )
    .await;
}

#[tokio::test]
async fn crawl_then_extract_queued_packages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server).await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let app = App::new(mock_config(&server, &dir)).unwrap();
    let cancel = CancellationToken::new();
    let db = app.database().await.unwrap();

    let crawler = app.crawler(db.clone()).unwrap();
    let mut publisher = app.publisher().unwrap();
    let summary = commands::crawl(&crawler, &mut publisher, &cancel)
        .await
        .unwrap();

    let base = format!("{}{FLAT_CONTAINER_PATH}", server.uri());
    let queued = queued_urls(&server, QUEUE_PATH).await;
    assert_eq!(
        queued,
        vec![
            format!("{base}/alpha/1.0.0/alpha.1.0.0.nupkg"),
            format!("{base}/gamma/3.0.0-rc/gamma.3.0.0-rc.nupkg"),
        ]
    );
    assert_eq!(summary.leaves_collected, 5);
    assert_eq!(summary.publish.batches, 1);
    assert_eq!(summary.cursor, ts("2023-01-01T00:00:20Z"));
    assert_eq!(
        db.get_cursor("catalog").await.unwrap(),
        Some(ts("2023-01-01T00:00:20Z"))
    );

    let extracted = commands::extract_packages(
        app.pool(),
        Arc::new(app.package_source().unwrap()),
        Arc::new(app.extractor(app.content_store().unwrap())),
        queued,
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(extracted.packages, 2);
    assert_eq!(extracted.missing, 0);
    assert_eq!(extracted.created, 2, "alpha and gamma");
    assert_eq!(extracted.already_present, 1, "Shared.dll duplicates Alpha.dll");

    let stored = std::fs::read_dir(dir.path().join("store").join("SHA512"))
        .unwrap()
        .count();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn second_crawl_publishes_nothing_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server).await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let app = App::new(mock_config(&server, &dir)).unwrap();
    let cancel = CancellationToken::new();
    let db = app.database().await.unwrap();
    let crawler = app.crawler(db).unwrap();

    commands::crawl(&crawler, &mut app.publisher().unwrap(), &cancel)
        .await
        .unwrap();
    let second = commands::crawl(&crawler, &mut app.publisher().unwrap(), &cancel)
        .await
        .unwrap();

    assert_eq!(second.previous_cursor, Some(ts("2023-01-01T00:00:20Z")));
    assert_eq!(second.pages_fetched, 0);
    assert_eq!(second.packages, 0);
    assert_eq!(request_count(&server, QUEUE_PATH).await, 1);
    assert_eq!(request_count(&server, "/v3/catalog0/page1.json").await, 1);
}

#[tokio::test]
async fn failed_publish_is_repeated_by_the_next_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_catalog(&server).await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let app = App::new(mock_config(&server, &dir)).unwrap();
    let cancel = CancellationToken::new();
    let db = app.database().await.unwrap();
    let crawler = app.crawler(db.clone()).unwrap();

    let first = commands::crawl(&crawler, &mut app.publisher().unwrap(), &cancel).await;
    assert!(first.is_err());
    assert_eq!(db.get_cursor("catalog").await.unwrap(), None);

    let second = commands::crawl(&crawler, &mut app.publisher().unwrap(), &cancel)
        .await
        .unwrap();
    assert_eq!(second.previous_cursor, None);
    assert_eq!(second.packages, 2);
    assert_eq!(
        db.get_cursor("catalog").await.unwrap(),
        Some(ts("2023-01-01T00:00:20Z"))
    );
}

#[tokio::test]
async fn queue_command_publishes_one_url() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path(QUEUE_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let app = App::new(mock_config(&server, &dir)).unwrap();
    let identity = nuget_assembly::package::PackageIdentity::new("Polly", "7.2.3").unwrap();

    commands::queue_package(
        &mut app.publisher().unwrap(),
        &app.config().catalog.package_base_url,
        &identity,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        queued_urls(&server, QUEUE_PATH).await,
        vec![format!(
            "{}{FLAT_CONTAINER_PATH}/polly/7.2.3/polly.7.2.3.nupkg",
            server.uri()
        )]
    );
}
