//! Catalog documents and package archives for tests

use serde_json::{Value, json};
use std::io::{Cursor, Write};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// One catalog leaf: `(id, version, commit timestamp, is_delete)`
pub type Leaf<'a> = (&'a str, &'a str, &'a str, bool);

/// Build a zip archive holding `entries` as `(name, contents)`
pub fn nupkg(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Catalog page document
pub fn page_document(url: &str, leaves: &[Leaf<'_>]) -> Value {
    let items: Vec<Value> = leaves
        .iter()
        .map(|(id, version, commit, is_delete)| {
            json!({
                "@id": format!("{url}#{id}.{version}.{commit}"),
                "@type": if *is_delete { "nuget:PackageDelete" } else { "nuget:PackageDetails" },
                "commitTimeStamp": commit,
                "nuget:id": id,
                "nuget:version": version,
            })
        })
        .collect();

    json!({ "@id": url, "items": items })
}

/// Catalog index document listing `(page url, page commit timestamp)`
pub fn index_document(commit: &str, pages: &[(String, &str)]) -> Value {
    let items: Vec<Value> = pages
        .iter()
        .map(|(url, page_commit)| {
            json!({ "@id": url, "@type": "CatalogPage", "commitTimeStamp": page_commit })
        })
        .collect();

    json!({ "commitTimeStamp": commit, "count": items.len(), "items": items })
}

/// Serve a JSON document at `route`
pub async fn serve_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve a package archive at `route`
pub async fn serve_package(server: &MockServer, route: &str, entries: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(nupkg(entries)))
        .mount(server)
        .await;
}

/// Message bodies of every batch the server received at `route`, in order
pub async fn queued_urls(server: &MockServer, route: &str) -> Vec<String> {
    let requests: Vec<Request> = server.received_requests().await.unwrap_or_default();

    requests
        .iter()
        .filter(|r| r.url.path() == route)
        .flat_map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["messages"]
                .as_array()
                .unwrap()
                .iter()
                .map(|m| m["body"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Number of requests the server received at `route`
pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
