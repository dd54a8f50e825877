//! CLI interface for the standalone trust commands
//!
//! Defined with clap's derive API. `verify` is the user-facing trust
//! check; `sign` is the release-tooling counterpart that produces the
//! detached signature published next to an archive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relay plugin trust verification
///
/// Verifies the digital signature of a plugin package before it is
/// installed, or signs an archive for publication.
#[derive(Parser, Debug)]
#[command(name = "relay-trust")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify a package's digital signature against the registry
    Verify {
        /// Package reference ([@scope/]name[@tag])
        package: String,

        /// Override the registry base URL
        #[arg(long, value_name = "URL")]
        registry: Option<String>,
    },

    /// Produce a detached base64 signature for an archive
    Sign {
        /// Archive file to sign
        #[arg(long, value_name = "PATH")]
        data: PathBuf,

        /// PEM-encoded RSA private key
        #[arg(long, value_name = "PATH")]
        key: PathBuf,

        /// Write the signature here instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}
