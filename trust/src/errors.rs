//! Error types for the trust-verification pipeline
//!
//! Every failure the pipeline can produce is a variant of [`TrustError`].
//! The orchestrator matches on these exhaustively to turn policy failures
//! into terminal rejection decisions, while genuine transport and I/O
//! faults are propagated to the caller unchanged.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TrustError>;

/// All errors the trust-verification pipeline can produce
#[derive(Debug, Error)]
pub enum TrustError {
    /// Package reference string could not be parsed
    #[error("invalid package identifier: {0}")]
    InvalidIdentifier(String),

    /// Registry answered with a non-200 status for the metadata document
    #[error("registry unreachable (HTTP {status})")]
    RegistryUnreachable { status: u16 },

    /// Registry metadata document has no versions map
    #[error("invalid registry metadata: missing versions map")]
    InvalidRegistryMetadata,

    /// Neither a literal version nor a dist-tag matched the requested tag
    #[error("tag or version '{0}' not found in registry metadata")]
    TagNotFound(String),

    /// Registry metadata document has no dist-tags map at all
    #[error("unexpected registry format: missing dist-tags map")]
    UnexpectedRegistryFormat,

    /// Artifact download answered with a non-200 status
    #[error("failed to retrieve content from {url} (HTTP {status})")]
    ContentRetrieval { url: String, status: u16 },

    /// Key material does not look like a PEM document
    #[error("invalid key format: expected PEM-encoded key material")]
    InvalidKeyFormat,

    /// Signature content is empty or not decodable
    #[error("invalid signature: empty or malformed signature content")]
    InvalidSignature,

    /// A signing URL points at a host outside the trusted domain
    #[error("unexpected signing host: {0}")]
    UnexpectedHost(String),

    /// TLS peer certificate does not match the pinned fingerprint
    #[error("certificate fingerprint mismatch: expected {expected}, got {actual}")]
    CertificateFingerprintMismatch { expected: String, actual: String },

    /// TLS peer presented a self-signed or untrusted certificate
    #[error("self-signed certificate encountered during signing-content retrieval")]
    SelfSignedCertificate,

    /// Resolved version carries no signing metadata
    #[error("package is not digitally signed")]
    NotSigned,

    /// Cryptographic verification of the archive returned false
    #[error("digital signature verification failed")]
    FailedDigitalSignatureVerification,

    /// User declined to install an unsigned package
    #[error("installation canceled by user")]
    CanceledByUser,

    /// Underlying HTTP transport fault
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Underlying file system fault
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in registry metadata or the whitelist file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RSA key or signing failure outside the typed cases above
    #[error("cryptographic error: {0}")]
    Crypto(String),
}

impl TrustError {
    /// Whether this error is a genuine transport/IO fault rather than a
    /// trust-policy outcome. Faults propagate out of the orchestrator;
    /// everything else becomes a terminal rejection decision.
    pub fn is_fault(&self) -> bool {
        matches!(self, TrustError::Transport(_) | TrustError::Io(_))
    }

    /// Classify a transport error, mapping an untrusted or self-signed
    /// peer certificate anywhere in the cause chain to the dedicated
    /// error; everything else stays a transport fault.
    pub fn from_transport(error: reqwest::Error) -> Self {
        if untrusted_certificate_in_chain(&error) {
            TrustError::SelfSignedCertificate
        } else {
            TrustError::Transport(error)
        }
    }
}

/// Whether any cause in the error chain reports an untrusted or
/// self-signed peer certificate
///
/// The TLS stack does not expose a typed rejection reason through the
/// HTTP client, so this matches the rendered cause messages
/// (`UnknownIssuer` is rustls's wording for an untrusted chain).
fn untrusted_certificate_in_chain(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("self-signed")
            || text.contains("self signed")
            || text.contains("unknownissuer")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct ChainError {
        message: &'static str,
        source: Option<Box<ChainError>>,
    }

    impl fmt::Display for ChainError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for ChainError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn test_untrusted_certificate_detected_deep_in_chain() {
        let error = ChainError {
            message: "error sending request",
            source: Some(Box::new(ChainError {
                message: "client connection error",
                source: Some(Box::new(ChainError {
                    message: "invalid peer certificate: UnknownIssuer",
                    source: None,
                })),
            })),
        };
        assert!(untrusted_certificate_in_chain(&error));

        let error = ChainError {
            message: "certificate verify failed: self-signed certificate",
            source: None,
        };
        assert!(untrusted_certificate_in_chain(&error));
    }

    #[test]
    fn test_ordinary_transport_chain_is_not_untrusted_certificate() {
        let error = ChainError {
            message: "error sending request",
            source: Some(Box::new(ChainError {
                message: "connection refused",
                source: None,
            })),
        };
        assert!(!untrusted_certificate_in_chain(&error));
    }
}
