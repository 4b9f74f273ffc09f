//! LinkProof CLI - offline tooling over exported evidence bundles
//!
//! - Fingerprint an episode (before/during/after comparison)
//! - Score install readiness from a bundle's timeline
//! - Generate a v1.4 ProofCard and run it through the egress gate
//! - Show the effective privacy policy

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::proofcard::ProofCardArgs;
use error::CliResult;
use output::OutputFormat;

/// LinkProof CLI application
#[derive(Parser)]
#[command(name = "linkproof")]
#[command(about = "LinkProof - evidence bundles, readiness and ProofCards", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "json")]
    format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Before/during/after fingerprint of an exported bundle
    Fingerprint {
        /// Path to the evidence bundle
        bundle: PathBuf,
    },

    /// Install readiness from a bundle's timeline
    Readiness {
        /// Path to the evidence bundle
        bundle: PathBuf,
    },

    /// Generate a ProofCard from a bundle's timeline
    #[command(alias = "card")]
    Proofcard(ProofCardArgs),

    /// Show the effective privacy policy
    Policy {
        /// Privacy policy file
        #[arg(long, env = "LINKPROOF_POLICY")]
        policy: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let out = cli.out.as_deref();
    match cli.command {
        Commands::Fingerprint { bundle } => commands::fingerprint::execute(&bundle, cli.format, out),
        Commands::Readiness { bundle } => commands::readiness::execute(&bundle, cli.format, out),
        Commands::Proofcard(args) => commands::proofcard::execute(args, cli.format, out),
        Commands::Policy { policy } => commands::policy::execute(policy.as_deref(), cli.format, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_proofcard_flags() {
        let cli = Cli::try_parse_from([
            "linkproof",
            "proofcard",
            "b.json",
            "--profile",
            "WIFI78_INSTALL_ACCEPT",
            "--egress",
            "priv",
            "--version-ref",
            "policy_snapshot_ref=PS-1",
            "--format",
            "yaml",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Yaml);
        match cli.command {
            Commands::Proofcard(args) => {
                assert_eq!(args.profile, "WIFI78_INSTALL_ACCEPT");
                assert_eq!(
                    args.version_refs,
                    vec![("policy_snapshot_ref".to_string(), "PS-1".to_string())]
                );
            }
            _ => panic!("expected proofcard"),
        }
    }

    #[test]
    fn rejects_unknown_egress_mode() {
        assert!(Cli::try_parse_from(["linkproof", "proofcard", "b.json", "--egress", "all"]).is_err());
    }
}
