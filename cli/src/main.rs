// Relay plugin trust CLI
// Standalone verification and signing commands

mod cli;
mod telemetry;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use relay_trust::fetcher::HttpFetcher;
use relay_trust::orchestrator::{ApprovalPrompt, PromptOutcome};
use relay_trust::{
    stream, verifier, PackageIdentifier, TrustConfiguration, TrustDecision, TrustError,
    TrustVerifier, VerificationOutcome,
};

use crate::cli::{Cli, Command};
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry();

    match cli.command {
        Command::Verify { package, registry } => handle_verify(&package, registry, cli.json).await,
        Command::Sign { data, key, out } => handle_sign(&data, &key, out).await,
    }
}

/// Asks on the terminal whether an unsigned package may install
struct StdinPrompt;

impl ApprovalPrompt for StdinPrompt {
    fn approve_unsigned(&self, package: &PackageIdentifier) -> PromptOutcome {
        eprintln!(
            "{} is not digitally signed and its authenticity cannot be verified.",
            package.full_name()
        );
        eprint!("Continue installation anyway? [y/N] ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(_) if line.trim().eq_ignore_ascii_case("y") => PromptOutcome::Approved,
            Ok(_) => PromptOutcome::Declined,
            Err(_) => PromptOutcome::NotInteractive,
        }
    }
}

async fn handle_verify(
    package: &str,
    registry: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let id = PackageIdentifier::parse(package)?;
    tracing::debug!("Verifying package trust for {}", id);

    let mut config = TrustConfiguration::from_env();
    if let Some(registry) = registry {
        config.registry_base_url = registry.trim_end_matches('/').to_string();
    }

    // JSON mode is for scripting; never block on a prompt there.
    let outcome = if json_output {
        let verifier = TrustVerifier::new(config)?;
        verifier.verify_package(&id).await?
    } else {
        let fetcher = HttpFetcher::new(&config)?;
        let verifier = TrustVerifier::with_parts(config, fetcher, StdinPrompt)?;
        verifier.verify_package(&id).await?
    };

    let message = decision_message(&id, &outcome);
    if json_output {
        println!(
            "{}",
            json!({ "message": message, "verified": outcome.result.verified })
        );
    } else {
        println!("{message}");
    }

    // A decided run exits zero even when installation was rejected;
    // only unrecoverable faults (the `?` paths above) exit non-zero.
    Ok(())
}

fn decision_message(id: &PackageIdentifier, outcome: &VerificationOutcome) -> String {
    let name = id.full_name();
    match &outcome.decision {
        TrustDecision::Verified => {
            format!("Successfully validated digital signature for {name}.")
        }
        TrustDecision::NotSignedButWhitelisted => {
            format!("{name} is not digitally signed but is whitelisted for installation.")
        }
        TrustDecision::NotSignedUserApproved => {
            format!("{name} is not digitally signed; installation approved by user.")
        }
        TrustDecision::Rejected(TrustError::NotSigned) => {
            format!("{name} is not digitally signed and cannot be trusted.")
        }
        TrustDecision::Rejected(TrustError::CanceledByUser) => {
            format!("Installation of {name} canceled by user.")
        }
        TrustDecision::Rejected(reason) => {
            format!("{name} failed trust verification: {reason}")
        }
    }
}

async fn handle_sign(data: &PathBuf, key: &PathBuf, out: Option<PathBuf>) -> anyhow::Result<()> {
    let signature = verifier::sign(stream::file_stream(data), stream::file_stream(key))
        .await
        .with_context(|| format!("failed to sign {}", data.display()))?;

    match out {
        Some(path) => {
            tokio::fs::write(&path, signature.as_bytes())
                .await
                .with_context(|| format!("failed to write signature to {}", path.display()))?;
            println!("Signature written to {}", path.display());
        }
        None => println!("{signature}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_trust::VerificationResult;

    fn outcome(decision: TrustDecision, verified: bool) -> VerificationOutcome {
        VerificationOutcome {
            decision,
            result: VerificationResult {
                tarball_url: Some("https://registry.example/t.tgz".to_string()),
                signature_url: None,
                public_key_url: None,
                local_archive_path: None,
                verified,
            },
        }
    }

    #[test]
    fn test_decision_messages() {
        let id = PackageIdentifier::parse("@acme/tool@1.2.3").unwrap();

        let msg = decision_message(&id, &outcome(TrustDecision::Verified, true));
        assert_eq!(
            msg,
            "Successfully validated digital signature for @acme/tool."
        );

        let msg = decision_message(
            &id,
            &outcome(TrustDecision::Rejected(TrustError::NotSigned), false),
        );
        assert!(msg.contains("not digitally signed"));

        let msg = decision_message(
            &id,
            &outcome(
                TrustDecision::Rejected(TrustError::FailedDigitalSignatureVerification),
                false,
            ),
        );
        assert!(msg.contains("failed trust verification"));
    }
}
