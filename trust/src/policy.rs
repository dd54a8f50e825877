//! Trust policy engine
//!
//! Pure decision logic: which hosts may serve signing content, whether a
//! TLS peer certificate matches the pin, and whether a package is
//! whitelisted to install unsigned. No network I/O happens here; the
//! only I/O is reading the whitelist file.

use std::io::ErrorKind;

use reqwest::Url;
use tracing::warn;

use crate::config::{TrustConfiguration, WHITELIST_FILE};
use crate::errors::{Result, TrustError};

/// Policy decisions derived from an immutable [`TrustConfiguration`]
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    config: TrustConfiguration,
}

impl TrustPolicy {
    pub fn new(config: TrustConfiguration) -> Self {
        Self { config }
    }

    /// Whether `url` is an acceptable source of signing content
    ///
    /// Default mode: exact HTTPS match against the trusted signing host.
    /// Widened mode (opt-in): any host under the trusted parent domain,
    /// and HTTPS is no longer enforced. The widened mode trades away both
    /// guarantees at once and is the riskier of the two.
    pub fn is_allowed_signing_host(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        if self.config.allow_all_signing_hosts {
            let domain = &self.config.trusted_parent_domain;
            host == *domain || host.ends_with(&format!(".{domain}"))
        } else {
            parsed.scheme() == "https" && host == self.config.trusted_signing_host
        }
    }

    /// Compare a connection's peer-certificate fingerprint against the pin
    ///
    /// Fails closed on mismatch unless pinning is disabled by
    /// configuration. Fingerprints are lowercase hex SHA-256 over the DER
    /// certificate.
    pub fn check_certificate_pin(&self, fingerprint: &str) -> Result<()> {
        if !self.config.pinning_enabled {
            return Ok(());
        }

        if !fingerprint.eq_ignore_ascii_case(&self.config.pinned_fingerprint) {
            return Err(TrustError::CertificateFingerprintMismatch {
                expected: self.config.pinned_fingerprint.to_ascii_lowercase(),
                actual: fingerprint.to_ascii_lowercase(),
            });
        }

        Ok(())
    }

    /// Apply the pin to one connection's peer-certificate observation
    ///
    /// A TLS connection that surfaces no peer certificate cannot satisfy
    /// the pin and fails closed. A connection without TLS carries no
    /// certificate to pin; whether it was acceptable at all is the host
    /// policy's call.
    pub fn enforce_certificate_pin(
        &self,
        tls_connection: bool,
        fingerprint: Option<&str>,
    ) -> Result<()> {
        if !self.config.pinning_enabled {
            return Ok(());
        }

        match fingerprint {
            Some(fingerprint) => self.check_certificate_pin(fingerprint),
            None if tls_connection => Err(TrustError::CertificateFingerprintMismatch {
                expected: self.config.pinned_fingerprint.to_ascii_lowercase(),
                actual: "no peer certificate".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Whether `package_name` may install unsigned
    ///
    /// Reads the JSON whitelist under the config directory. A missing
    /// file means an empty whitelist, not an error; any other read
    /// failure propagates.
    pub async fn is_whitelisted(&self, package_name: &str) -> Result<bool> {
        let path = self.config.config_dir.join(WHITELIST_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let names: Vec<String> = serde_json::from_str(&contents)?;
        let whitelisted = names.iter().any(|name| name == package_name);
        if whitelisted {
            warn!(
                "Package {} is whitelisted to install without a signature",
                package_name
            );
        }
        Ok(whitelisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> TrustConfiguration {
        TrustConfiguration {
            trusted_signing_host: "signing.relay.dev".to_string(),
            trusted_parent_domain: "relay.dev".to_string(),
            allow_all_signing_hosts: false,
            pinned_fingerprint: "ab".repeat(32),
            pinning_enabled: true,
            registry_base_url: "https://registry.npmjs.org".to_string(),
            config_dir: PathBuf::from("/nonexistent"),
            cache_dir: PathBuf::from("/nonexistent/cache"),
        }
    }

    #[test]
    fn test_default_mode_requires_exact_https_host() {
        let policy = TrustPolicy::new(config());
        assert!(policy.is_allowed_signing_host("https://signing.relay.dev/tool.sig"));
        assert!(!policy.is_allowed_signing_host("http://signing.relay.dev/tool.sig"));
        assert!(!policy.is_allowed_signing_host("https://evil.example/tool.sig"));
        assert!(!policy.is_allowed_signing_host("https://other.relay.dev/tool.sig"));
        assert!(!policy.is_allowed_signing_host("not a url"));
    }

    #[test]
    fn test_widened_mode_accepts_parent_domain_hosts() {
        let mut config = config();
        config.allow_all_signing_hosts = true;
        let policy = TrustPolicy::new(config);

        assert!(policy.is_allowed_signing_host("https://signing.relay.dev/tool.sig"));
        assert!(policy.is_allowed_signing_host("https://cdn.relay.dev/tool.sig"));
        assert!(policy.is_allowed_signing_host("https://relay.dev/tool.sig"));
        // HTTPS is not enforced in the widened mode
        assert!(policy.is_allowed_signing_host("http://cdn.relay.dev/tool.sig"));
        // Suffix tricks outside the parent domain still fail
        assert!(!policy.is_allowed_signing_host("https://evilrelay.dev.example/tool.sig"));
        assert!(!policy.is_allowed_signing_host("https://notrelay.dev.attacker.example/x"));
    }

    #[test]
    fn test_certificate_pin_match_and_mismatch() {
        let policy = TrustPolicy::new(config());
        let pinned = "ab".repeat(32);

        assert!(policy.check_certificate_pin(&pinned).is_ok());
        assert!(policy
            .check_certificate_pin(&pinned.to_ascii_uppercase())
            .is_ok());
        assert!(matches!(
            policy.check_certificate_pin(&"cd".repeat(32)),
            Err(TrustError::CertificateFingerprintMismatch { .. })
        ));
    }

    #[test]
    fn test_pin_enforcement_fails_closed_without_tls_certificate() {
        let policy = TrustPolicy::new(config());
        let pinned = "ab".repeat(32);

        // TLS connection with a matching certificate passes
        assert!(policy.enforce_certificate_pin(true, Some(&pinned)).is_ok());
        // TLS connection with the wrong certificate fails
        assert!(matches!(
            policy.enforce_certificate_pin(true, Some(&"cd".repeat(32))),
            Err(TrustError::CertificateFingerprintMismatch { .. })
        ));
        // TLS connection that surfaces no certificate fails closed
        assert!(matches!(
            policy.enforce_certificate_pin(true, None),
            Err(TrustError::CertificateFingerprintMismatch { .. })
        ));
        // No TLS, no certificate to pin
        assert!(policy.enforce_certificate_pin(false, None).is_ok());
    }

    #[test]
    fn test_pin_enforcement_disabled_passes_everything() {
        let mut config = config();
        config.pinning_enabled = false;
        let policy = TrustPolicy::new(config);
        assert!(policy.enforce_certificate_pin(true, None).is_ok());
        assert!(policy
            .enforce_certificate_pin(true, Some(&"cd".repeat(32)))
            .is_ok());
    }

    #[test]
    fn test_certificate_pin_disabled_always_passes() {
        let mut config = config();
        config.pinning_enabled = false;
        let policy = TrustPolicy::new(config);
        assert!(policy.check_certificate_pin(&"cd".repeat(32)).is_ok());
    }

    #[tokio::test]
    async fn test_whitelist_missing_file_is_false() {
        let policy = TrustPolicy::new(config());
        assert!(!policy.is_whitelisted("tool").await.unwrap());
    }

    #[tokio::test]
    async fn test_whitelist_membership() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.config_dir = dir.path().to_path_buf();
        tokio::fs::write(
            dir.path().join(WHITELIST_FILE),
            r#"["@acme/tool", "other-tool"]"#,
        )
        .await
        .unwrap();

        let policy = TrustPolicy::new(config);
        assert!(policy.is_whitelisted("@acme/tool").await.unwrap());
        assert!(policy.is_whitelisted("other-tool").await.unwrap());
        assert!(!policy.is_whitelisted("tool").await.unwrap());
    }

    #[tokio::test]
    async fn test_whitelist_malformed_json_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.config_dir = dir.path().to_path_buf();
        tokio::fs::write(dir.path().join(WHITELIST_FILE), "{ not json")
            .await
            .unwrap();

        let policy = TrustPolicy::new(config);
        assert!(matches!(
            policy.is_whitelisted("tool").await,
            Err(TrustError::Json(_))
        ));
    }
}
