// src/repository/client.rs

//! Metadata transport
//!
//! [`Transport`] is the seam between repository loading and the network.
//! [`RepositoryClient`] implements it with a blocking reqwest client for
//! http(s) URLs, with retries, and direct reads for `file://` URLs.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for one URL
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Fetches the raw bytes behind a URL
pub trait Transport: Send + Sync {
    /// Fetch `url`; `verify_tls = false` disables certificate checks
    fn fetch(&self, url: &str, verify_tls: bool) -> Result<Vec<u8>>;
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    /// Used for repositories configured with `ignoressl`
    insecure_client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let build = |insecure: bool| {
            Client::builder()
                .timeout(HTTP_TIMEOUT)
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))
        };

        Ok(Self {
            client: build(false)?,
            insecure_client: build(true)?,
            max_retries: MAX_RETRIES,
        })
    }

    fn fetch_http(&self, url: &str, verify_tls: bool) -> Result<Vec<u8>> {
        let client = if verify_tls {
            &self.client
        } else {
            &self.insecure_client
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let bytes = response.bytes().map_err(|e| {
                        Error::DownloadError(format!("Failed to read response from {}: {}", url, e))
                    })?;
                    debug!("Fetched {} ({} bytes)", url, bytes.len());
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} of {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl Transport for RepositoryClient {
    fn fetch(&self, url: &str, verify_tls: bool) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::DownloadError(format!("Invalid URL '{}': {}", url, e)))?;

        match parsed.scheme() {
            "http" | "https" => self.fetch_http(url, verify_tls),
            "file" => read_file_url(&parsed),
            other => Err(Error::DownloadError(format!(
                "Unsupported URL scheme '{}' in {}",
                other, url
            ))),
        }
    }
}

/// Read the local file behind a `file://` URL
pub fn read_file_url(url: &Url) -> Result<Vec<u8>> {
    let path = url
        .to_file_path()
        .map_err(|_| Error::DownloadError(format!("Invalid file URL {}", url)))?;
    fs::read(&path)
        .map_err(|e| Error::DownloadError(format!("Cannot download {}: {}", url, e)))
}

/// Join a mirror base URL and a metadata-relative path
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://example.com/repo/", "repodata/repomd.xml"),
            "https://example.com/repo/repodata/repomd.xml"
        );
        assert_eq!(join_url("file:///srv/repo", "/x.rpm"), "file:///srv/repo/x.rpm");
    }

    #[test]
    fn test_fetch_file_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repomd.xml");
        fs::write(&path, b"<repomd/>").unwrap();

        let client = RepositoryClient::new().unwrap();
        let url = Url::from_file_path(&path).unwrap();
        assert_eq!(client.fetch(url.as_str(), true).unwrap(), b"<repomd/>");
    }

    #[test]
    fn test_fetch_missing_file_and_bad_scheme() {
        let client = RepositoryClient::new().unwrap();
        assert!(matches!(
            client.fetch("file:///nonexistent/depsolve/repomd.xml", true),
            Err(Error::DownloadError(_))
        ));
        assert!(client.fetch("ftp://example.com/repo", true).is_err());
        assert!(client.fetch("not a url", true).is_err());
    }
}
