//! Relay Plugin Trust Library
//!
//! This library implements the trust-verification pipeline run before a
//! Relay CLI plugin package is installed: resolve the package's signing
//! metadata from the registry, fetch the detached signature and public
//! key, cryptographically verify the archive, and decide whether
//! installation may proceed when no valid signature exists.
//! It is used by the installer and by the standalone `relay-trust` binary.

/// Package identifier parsing
pub mod identifier;

/// Immutable per-run trust configuration
pub mod config;

/// Error types
pub mod errors;

/// Registry metadata resolution
pub mod registry;

/// Pull-based byte stream abstraction
pub mod stream;

/// Artifact fetching
pub mod fetcher;

/// Streaming signature operations
pub mod verifier;

/// Trust policy engine
pub mod policy;

/// Verification orchestration
pub mod orchestrator;

pub use config::TrustConfiguration;
pub use errors::{Result, TrustError};
pub use identifier::PackageIdentifier;
pub use orchestrator::{
    ApprovalPrompt, NonInteractive, PromptOutcome, TrustDecision, TrustVerifier,
    VerificationOutcome, VerificationResult,
};
