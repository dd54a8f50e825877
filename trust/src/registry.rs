//! Registry metadata resolution
//!
//! Fetches a package's metadata document from the registry and resolves
//! the requested tag to a concrete version record. Documents are fetched
//! fresh on every verification attempt, never cached across runs.
//!
//! Tag resolution order:
//! 1. the tag as a literal version key in the `versions` map
//! 2. the tag as a dist-tag, whose value must look like a version
//!    (contain a `.`) and name a known version

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, TrustError};
use crate::identifier::PackageIdentifier;

/// Tarball location for a published version
#[derive(Debug, Clone, Deserialize)]
pub struct DistInfo {
    pub tarball: String,
}

/// Signing metadata for a published version
///
/// Lives under the registry's `sfdx` key per the publishing convention
/// this registry follows. A version without this section is unsigned.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningInfo {
    #[serde(rename = "publicKeyUrl")]
    pub public_key_url: String,
    #[serde(rename = "signatureUrl")]
    pub signature_url: String,
}

/// A single entry in the metadata document's `versions` map
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub dist: DistInfo,
    #[serde(rename = "sfdx", default)]
    pub signing: Option<SigningInfo>,
}

/// Package metadata document as served by the registry
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub versions: Option<HashMap<String, VersionEntry>>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: Option<HashMap<String, String>>,
}

/// Outcome of resolving an identifier against the registry
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    /// Concrete version the tag resolved to
    pub version: String,
    /// Archive download URL
    pub tarball_url: String,
    /// Signing URLs, absent for unsigned versions
    pub signing: Option<SigningInfo>,
}

/// Registry client
///
/// Thin wrapper over a shared HTTP client; owns the base URL and the
/// metadata GET + resolution step of the pipeline.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the metadata document for `id` and resolve its tag
    pub async fn resolve(&self, id: &PackageIdentifier) -> Result<ResolvedVersion> {
        let url = format!("{}/{}", self.base_url, id.registry_path());
        debug!("Fetching registry metadata: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(TrustError::from_transport)?;
        if response.status() != StatusCode::OK {
            return Err(TrustError::RegistryUnreachable {
                status: response.status().as_u16(),
            });
        }

        let document: MetadataDocument = response.json().await?;
        resolve_document(&document, id)
    }
}

/// Resolve `id.tag` against an already-fetched metadata document
///
/// Split from the transport so the resolution rules are testable on
/// their own.
pub fn resolve_document(
    document: &MetadataDocument,
    id: &PackageIdentifier,
) -> Result<ResolvedVersion> {
    let versions = document
        .versions
        .as_ref()
        .ok_or(TrustError::InvalidRegistryMetadata)?;

    // A literal version key always wins over a dist-tag of the same name.
    if let Some(entry) = versions.get(&id.tag) {
        return Ok(resolved(&id.tag, entry));
    }

    let dist_tags = document
        .dist_tags
        .as_ref()
        .ok_or(TrustError::UnexpectedRegistryFormat)?;

    match dist_tags.get(&id.tag) {
        Some(version) if version.contains('.') => versions
            .get(version)
            .map(|entry| resolved(version, entry))
            .ok_or_else(|| TrustError::TagNotFound(id.tag.clone())),
        _ => Err(TrustError::TagNotFound(id.tag.clone())),
    }
}

fn resolved(version: &str, entry: &VersionEntry) -> ResolvedVersion {
    ResolvedVersion {
        version: version.to_string(),
        tarball_url: entry.dist.tarball.clone(),
        signing: entry.signing.clone(),
    }
}
