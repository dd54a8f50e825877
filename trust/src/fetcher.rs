//! Artifact fetching
//!
//! Streams archive, signature, and public-key content from their resolved
//! URLs. Archives go straight to the cache directory chunk-by-chunk and
//! are never buffered whole in memory. Signing-content retrieval enforces
//! certificate pinning on every TLS connection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::TrustConfiguration;
use crate::errors::{Result, TrustError};
use crate::policy::TrustPolicy;
use crate::stream::{self, ByteStream};

/// Fallback archive filename when the tarball URL has no usable path segment
const DEFAULT_ARCHIVE_NAME: &str = "package.tgz";

/// Source of remote artifact content
///
/// The orchestrator talks to this seam, not to the HTTP client directly,
/// so tests can substitute a recording implementation.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Stream signing content (signature or public key) from `url`
    async fn fetch_content(&self, url: &str) -> Result<ByteStream>;

    /// Stream the package archive into `cache_dir`, returning the local path
    async fn fetch_archive_to_cache(
        &self,
        tarball_url: &str,
        cache_dir: &Path,
    ) -> Result<PathBuf>;
}

/// HTTP-backed artifact source
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: TrustPolicy,
}

impl HttpFetcher {
    pub fn new(config: &TrustConfiguration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("relay-trust/", env!("CARGO_PKG_VERSION")))
            .tls_info(config.pinning_enabled)
            .build()?;

        Ok(Self {
            client,
            policy: TrustPolicy::new(config.clone()),
        })
    }

    /// Apply the certificate pin to the connection behind `response`
    ///
    /// A TLS connection that surfaces no peer certificate fails closed;
    /// see [`TrustPolicy::enforce_certificate_pin`].
    fn check_certificate_pin(&self, response: &reqwest::Response) -> Result<()> {
        let fingerprint = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|tls| tls.peer_certificate())
            .map(|der| hex::encode(Sha256::digest(der)));

        self.policy
            .enforce_certificate_pin(response.url().scheme() == "https", fingerprint.as_deref())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TrustError::from_transport)?;

        if response.status() != StatusCode::OK {
            return Err(TrustError::ContentRetrieval {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ArtifactSource for HttpFetcher {
    async fn fetch_content(&self, url: &str) -> Result<ByteStream> {
        debug!("Fetching signing content: {}", url);
        let response = self.get(url).await?;
        self.check_certificate_pin(&response)?;
        Ok(stream::response_stream(response))
    }

    async fn fetch_archive_to_cache(
        &self,
        tarball_url: &str,
        cache_dir: &Path,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(cache_dir).await?;
        let dest = archive_cache_path(tarball_url, cache_dir);

        info!("Downloading archive: {}", tarball_url);
        let response = self.get(tarball_url).await?;

        // Stream straight to disk; concurrent installs of the same
        // version race benignly on this deterministic filename.
        let mut file = tokio::fs::File::create(&dest).await?;
        if let Err(e) = stream_to_file(response, &mut file).await {
            // Never leave a truncated archive behind
            drop(file);
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }

        debug!("Archive cached at: {}", dest.display());
        Ok(dest)
    }
}

async fn stream_to_file(response: reqwest::Response, file: &mut tokio::fs::File) -> Result<()> {
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(TrustError::from_transport)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Deterministic cache destination for an archive URL
pub fn archive_cache_path(tarball_url: &str, cache_dir: &Path) -> PathBuf {
    cache_dir.join(archive_file_name(tarball_url))
}

/// Derive the cache filename from the tarball URL's last path segment
fn archive_file_name(tarball_url: &str) -> String {
    tarball_url
        .split('/')
        .next_back()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment))
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_ARCHIVE_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_file_name_from_url() {
        assert_eq!(
            archive_file_name("https://registry.example/tool/-/tool-1.2.3.tgz"),
            "tool-1.2.3.tgz"
        );
        assert_eq!(
            archive_file_name("https://registry.example/tool-1.2.3.tgz?token=abc"),
            "tool-1.2.3.tgz"
        );
        assert_eq!(archive_file_name("https://registry.example/"), "package.tgz");
    }
}
