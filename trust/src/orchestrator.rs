//! Verification orchestration
//!
//! Drives a single verification run through its states:
//! resolving metadata, validating signing hosts, fetching artifacts,
//! verifying the signature, and finally deciding. Each run produces
//! exactly one [`TrustDecision`]; there is no internal retry.
//!
//! Typed trust failures become terminal `Rejected` decisions. Genuine
//! transport and I/O faults propagate to the caller unchanged.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::TrustConfiguration;
use crate::errors::{Result, TrustError};
use crate::fetcher::{self, ArtifactSource, HttpFetcher};
use crate::identifier::PackageIdentifier;
use crate::policy::TrustPolicy;
use crate::registry::{RegistryClient, ResolvedVersion};
use crate::stream;
use crate::verifier;

/// Terminal outcome of a verification run
#[derive(Debug)]
pub enum TrustDecision {
    /// Cryptographic verification succeeded
    Verified,
    /// Unsigned, but the package is on the local whitelist
    NotSignedButWhitelisted,
    /// Unsigned, but the user granted a one-time approval
    NotSignedUserApproved,
    /// Installation must not proceed, for the carried reason
    Rejected(TrustError),
}

impl TrustDecision {
    /// Whether the installer may proceed with this decision
    pub fn allows_installation(&self) -> bool {
        !matches!(self, TrustDecision::Rejected(_))
    }
}

/// Facts gathered during a run, produced exactly once and immutable
/// after the decision is made
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Archive URL, absent when resolution itself failed
    pub tarball_url: Option<String>,
    /// Detached signature URL, absent for unsigned versions
    pub signature_url: Option<String>,
    /// Public key URL, absent for unsigned versions
    pub public_key_url: Option<String>,
    /// Where the archive landed in the cache, once fetched
    pub local_archive_path: Option<PathBuf>,
    /// True only if cryptographic verification succeeded
    pub verified: bool,
}

impl VerificationResult {
    fn unresolved() -> Self {
        Self {
            tarball_url: None,
            signature_url: None,
            public_key_url: None,
            local_archive_path: None,
            verified: false,
        }
    }
}

/// Decision plus the facts it was made from
#[derive(Debug)]
pub struct VerificationOutcome {
    pub decision: TrustDecision,
    pub result: VerificationResult,
}

/// Outcome of asking for a one-time unsigned-install approval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Approved,
    Declined,
    /// No interactive channel is available
    NotInteractive,
}

/// Capability to ask the user about installing an unsigned package
///
/// Injected into the orchestrator so non-interactive contexts (and
/// tests) stay deterministic.
pub trait ApprovalPrompt: Send + Sync {
    fn approve_unsigned(&self, package: &PackageIdentifier) -> PromptOutcome;
}

/// Prompt implementation that always declines
pub struct NonInteractive;

impl ApprovalPrompt for NonInteractive {
    fn approve_unsigned(&self, _package: &PackageIdentifier) -> PromptOutcome {
        PromptOutcome::NotInteractive
    }
}

/// Single public entry point for package trust verification
///
/// Used by the installer before any plugin package is unpacked, and by
/// the standalone `verify` command.
pub struct TrustVerifier<S: ArtifactSource, P: ApprovalPrompt> {
    registry: RegistryClient,
    source: S,
    policy: TrustPolicy,
    prompt: P,
    cache_dir: PathBuf,
}

impl TrustVerifier<HttpFetcher, NonInteractive> {
    /// Build the production verifier: HTTP fetching, no interactive prompt
    pub fn new(config: TrustConfiguration) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_parts(config, fetcher, NonInteractive)
    }
}

impl<S: ArtifactSource, P: ApprovalPrompt> TrustVerifier<S, P> {
    /// Build a verifier with explicit fetcher and prompt implementations
    pub fn with_parts(config: TrustConfiguration, source: S, prompt: P) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("relay-trust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let registry = RegistryClient::new(client, config.registry_base_url.clone());
        let cache_dir = config.cache_dir.clone();

        Ok(Self {
            registry,
            source,
            policy: TrustPolicy::new(config),
            prompt,
            cache_dir,
        })
    }

    /// Run the verification state machine once for `id`
    pub async fn verify_package(&self, id: &PackageIdentifier) -> Result<VerificationOutcome> {
        info!("Verifying package trust: {}", id);

        // ResolvingMetadata
        let resolved = match self.registry.resolve(id).await {
            Ok(resolved) => resolved,
            Err(e) => return decide_rejected(e, VerificationResult::unresolved()),
        };
        debug!("Resolved {} to version {}", id.full_name(), resolved.version);

        let Some(signing) = resolved.signing.clone() else {
            return self.decide_unsigned(id, &resolved).await;
        };

        let mut result = VerificationResult {
            tarball_url: Some(resolved.tarball_url.clone()),
            signature_url: Some(signing.signature_url.clone()),
            public_key_url: Some(signing.public_key_url.clone()),
            local_archive_path: None,
            verified: false,
        };

        // ValidatingSigningHosts — must precede any fetch of these URLs
        for url in [&signing.signature_url, &signing.public_key_url] {
            if !self.policy.is_allowed_signing_host(url) {
                return decide_rejected(TrustError::UnexpectedHost(url.clone()), result);
            }
        }

        // FetchingArtifacts — archive, signature, and key have no ordering
        // dependency between them and are fetched concurrently
        let fetched = tokio::try_join!(
            self.source
                .fetch_archive_to_cache(&resolved.tarball_url, &self.cache_dir),
            fetch_bytes(&self.source, &signing.signature_url),
            fetch_bytes(&self.source, &signing.public_key_url),
        );
        let (archive_path, signature, public_key) = match fetched {
            Ok(artifacts) => artifacts,
            Err(e) => {
                // A sibling fetch failure aborts the archive download
                // mid-write; drop whatever partial file it left behind.
                discard_archive(&fetcher::archive_cache_path(
                    &resolved.tarball_url,
                    &self.cache_dir,
                ))
                .await;
                return decide_rejected(e, result);
            }
        };
        result.local_archive_path = Some(archive_path.clone());

        // Verifying
        let verified = match verifier::verify(
            stream::file_stream(&archive_path),
            stream::memory_stream(signature),
            stream::memory_stream(public_key),
        )
        .await
        {
            Ok(verified) => verified,
            Err(e) => {
                discard_archive(&archive_path).await;
                result.local_archive_path = None;
                return decide_rejected(e, result);
            }
        };

        if verified {
            info!("Digital signature verified for {}", id.full_name());
            result.verified = true;
            Ok(VerificationOutcome {
                decision: TrustDecision::Verified,
                result,
            })
        } else {
            discard_archive(&archive_path).await;
            result.local_archive_path = None;
            decide_rejected(TrustError::FailedDigitalSignatureVerification, result)
        }
    }

    /// Decide the fate of a version that carries no signing metadata:
    /// whitelist first, then a one-time interactive approval
    async fn decide_unsigned(
        &self,
        id: &PackageIdentifier,
        resolved: &ResolvedVersion,
    ) -> Result<VerificationOutcome> {
        let result = VerificationResult {
            tarball_url: Some(resolved.tarball_url.clone()),
            signature_url: None,
            public_key_url: None,
            local_archive_path: None,
            verified: false,
        };

        if self.policy.is_whitelisted(&id.full_name()).await? {
            info!("{} is unsigned but whitelisted", id.full_name());
            return Ok(VerificationOutcome {
                decision: TrustDecision::NotSignedButWhitelisted,
                result,
            });
        }

        let decision = match self.prompt.approve_unsigned(id) {
            PromptOutcome::Approved => TrustDecision::NotSignedUserApproved,
            PromptOutcome::Declined => TrustDecision::Rejected(TrustError::CanceledByUser),
            PromptOutcome::NotInteractive => TrustDecision::Rejected(TrustError::NotSigned),
        };
        Ok(VerificationOutcome { decision, result })
    }
}

/// Turn a typed trust failure into a terminal rejection; let genuine
/// transport/IO faults escape unchanged
fn decide_rejected(error: TrustError, result: VerificationResult) -> Result<VerificationOutcome> {
    if error.is_fault() {
        return Err(error);
    }
    debug!("Verification rejected: {}", error);
    Ok(VerificationOutcome {
        decision: TrustDecision::Rejected(error),
        result,
    })
}

/// Fetch bounded signing content fully into memory
async fn fetch_bytes<S: ArtifactSource>(source: &S, url: &str) -> Result<Vec<u8>> {
    stream::collect(source.fetch_content(url).await?).await
}

/// Best-effort removal of a cached archive the run no longer vouches for
async fn discard_archive(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Failed to remove cached archive {}: {}", path.display(), e);
        }
    }
}
