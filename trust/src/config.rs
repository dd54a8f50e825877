//! Trust configuration
//!
//! All policy toggles are captured once at the start of a run into an
//! immutable [`TrustConfiguration`]. Deeper call paths never read the
//! process environment themselves; they receive this struct.

use std::env;
use std::path::PathBuf;

/// Hostname that signing content must be served from by default
pub const TRUSTED_SIGNING_HOST: &str = "signing.relay.dev";

/// Parent domain accepted when widened host matching is opted into
pub const TRUSTED_PARENT_DOMAIN: &str = "relay.dev";

/// Default registry serving package metadata and archives
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// SHA-256 fingerprint (lowercase hex, DER encoding) of the signing host's
/// TLS certificate. Rotated alongside the certificate itself.
pub const PINNED_CERT_FINGERPRINT: &str =
    "b7e23ec29af22b0b4e41da31e868d57226121c84c6d709893f72a1df8d47ea53";

/// Whitelist file name under the config directory
pub const WHITELIST_FILE: &str = "unsignedPluginWhiteList.json";

/// Opt-in: accept any signing host under the trusted parent domain.
/// This also stops enforcing HTTPS on signing URLs — the riskier mode.
pub const ENV_ALLOW_ALL_SIGNING_HOSTS: &str = "RELAY_ALLOW_ALL_SIGNING_HOSTS";

/// Override of the pinned certificate fingerprint
pub const ENV_PINNED_CERT_FINGERPRINT: &str = "RELAY_PINNED_CERT_FINGERPRINT";

/// Opt-out: disable certificate pinning entirely
pub const ENV_DISABLE_CERT_PINNING: &str = "RELAY_DISABLE_CERT_PINNING";

/// Override of the registry base URL
pub const ENV_REGISTRY_URL: &str = "RELAY_REGISTRY_URL";

/// Immutable per-run trust configuration
#[derive(Debug, Clone)]
pub struct TrustConfiguration {
    /// Exact host signing content must come from (default mode)
    pub trusted_signing_host: String,
    /// Parent domain accepted in widened mode
    pub trusted_parent_domain: String,
    /// Widened host matching opt-in; drops the HTTPS requirement too
    pub allow_all_signing_hosts: bool,
    /// Pinned TLS certificate fingerprint, lowercase hex SHA-256 over DER
    pub pinned_fingerprint: String,
    /// Whether certificate pinning is enforced
    pub pinning_enabled: bool,
    /// Registry base URL, no trailing slash
    pub registry_base_url: String,
    /// Config directory holding the unsigned-package whitelist
    pub config_dir: PathBuf,
    /// Cache directory that verified archives are downloaded into
    pub cache_dir: PathBuf,
}

impl TrustConfiguration {
    /// Build the configuration from the process environment, falling back
    /// to the built-in defaults. Read exactly once per run.
    pub fn from_env() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let relay_dir = home.join(".relay");

        Self {
            trusted_signing_host: TRUSTED_SIGNING_HOST.to_string(),
            trusted_parent_domain: TRUSTED_PARENT_DOMAIN.to_string(),
            allow_all_signing_hosts: env_flag(ENV_ALLOW_ALL_SIGNING_HOSTS),
            pinned_fingerprint: env::var(ENV_PINNED_CERT_FINGERPRINT)
                .unwrap_or_else(|_| PINNED_CERT_FINGERPRINT.to_string()),
            pinning_enabled: !env_flag(ENV_DISABLE_CERT_PINNING),
            registry_base_url: env::var(ENV_REGISTRY_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string()),
            config_dir: relay_dir.clone(),
            cache_dir: relay_dir.join("cache").join("packages"),
        }
    }
}

/// Read a boolean opt-in flag from the environment
fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
        .unwrap_or(false)
}
