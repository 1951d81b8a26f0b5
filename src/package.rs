//! Package identities and the package download source
//!
//! Packages are addressed in a flat container layout:
//! `{base}/{id}/{version}/{id}.{version}.nupkg`, with the id and the
//! normalized version lowercased.

use crate::config::parse_url;
use crate::error::{Error, Result};
use crate::store::TempBlob;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use std::fmt;
use std::io;
use tokio_util::io::StreamReader;
use tracing::debug;

/// A package id plus its normalized version
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    id: String,
    version: String,
}

impl PackageIdentity {
    /// Create an identity, normalizing `version`
    pub fn new(id: &str, version: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Other("package id must not be empty".to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            version: normalize_version(version)?,
        })
    }

    /// Package id as published
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Case-insensitive comparison key: `(lowercase id, lowercase version)`
    pub fn key(&self) -> (String, String) {
        (self.id.to_lowercase(), self.version.to_lowercase())
    }

    /// Download URL of this package under a flat-container `base_url`
    pub fn flat_container_url(&self, base_url: &str) -> String {
        flat_container_url(base_url, &self.id, &self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// `{base}/{id}/{version}/{id}.{version}.nupkg` with id and version lowercased
pub fn flat_container_url(base_url: &str, id: &str, version: &str) -> String {
    let id = id.to_lowercase();
    let version = version.to_lowercase();
    format!(
        "{}/{id}/{version}/{id}.{version}.nupkg",
        base_url.trim_end_matches('/')
    )
}

/// Normalize a package version string
///
/// - build metadata (`+...`) is dropped
/// - numeric parts lose leading zeros
/// - at least three numeric parts are emitted; a zero fourth part is dropped
/// - a pre-release label (`-...`) is kept verbatim
pub fn normalize_version(raw: &str) -> Result<String> {
    let invalid = || Error::InvalidVersion(raw.to_string());

    let without_metadata = raw.trim().split('+').next().unwrap_or_default();
    let (numbers, label) = match without_metadata.split_once('-') {
        Some((numbers, label)) if !label.is_empty() => (numbers, Some(label)),
        Some(_) => return Err(invalid()),
        None => (without_metadata, None),
    };

    let parts = numbers
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<u64>>>()?;

    if parts.is_empty() || parts.len() > 4 {
        return Err(invalid());
    }

    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    let mut normalized = format!("{}.{}.{}", part(0), part(1), part(2));
    if part(3) != 0 {
        normalized.push_str(&format!(".{}", part(3)));
    }
    if let Some(label) = label {
        normalized.push('-');
        normalized.push_str(label);
    }

    Ok(normalized)
}

/// Where package archives are downloaded from
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Download URL for `identity`
    fn package_url(&self, identity: &PackageIdentity) -> String;

    /// Download the archive at `url`, or `None` if no package exists there
    async fn fetch_or_none(&self, url: &str) -> Result<Option<TempBlob>>;
}

/// Flat-container package source over HTTP
#[derive(Clone, Debug)]
pub struct HttpPackageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPackageSource {
    /// Create a source for the flat container at `base_url`
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        parse_url("catalog.package_base_url", base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    fn package_url(&self, identity: &PackageIdentity) -> String {
        identity.flat_container_url(&self.base_url)
    }

    async fn fetch_or_none(&self, url: &str) -> Result<Option<TempBlob>> {
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(body);
        tokio::pin!(reader);

        let blob = TempBlob::from_async_reader(&mut reader).await?;
        debug!(url, bytes = blob.len(), "downloaded package");
        Ok(Some(blob))
    }
}
