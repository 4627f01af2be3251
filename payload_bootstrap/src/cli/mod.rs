// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-line interface
//!
//! Parses and validates the `dittofs-payload-demo` binary's arguments.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. clap::Parser::parse()            │  Parse CLI
//! └─────────────────┬─────────────────────┘
//!                    ↓
//! ┌─────────────────────────────────────┐
//! │  2. validator::SecureArgParser       │  Security validation
//! └─────────────────┬─────────────────────┘
//!                    ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                     │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

pub mod validator;

pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `dittofs-payload-demo` — exercises the `PayloadService` facade from the
/// command line. Not a protocol server: no NFS/SMB or HTTP control-plane
/// surface is implemented here.
#[derive(Parser, Debug)]
#[command(name = "dittofs-payload-demo", version, about)]
pub struct Cli {
    /// Enables debug-level logging.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file; `DITTOFS_*` environment
    /// variables always take precedence over values loaded from here.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Constructs a `PayloadService` from configuration and serves
    /// `/metrics` + `/health` until a shutdown signal arrives, draining
    /// the Offloader before exiting.
    Serve {
        /// Overrides the configured metrics listener port.
        #[arg(long)]
        metrics_port: Option<u16>,
    },
    /// Runs `BlockStore::healthcheck` against the configured backend and
    /// reports the result.
    Health,
    /// Runs Offloader recovery against an existing cache directory and
    /// prints the resulting `RecoveryStats`.
    Recover {
        /// Durable cache backing file or directory to recover from.
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

/// CLI arguments after security validation: paths canonicalized, numeric
/// values range-checked.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Serve { metrics_port: Option<u16> },
    Health,
    Recover { cache_dir: PathBuf },
}

/// Parses `std::env::args()` with `clap`, then validates the result.
///
/// # Errors
///
/// Returns [`ParseError`] if any argument fails validation. `clap`
/// handles `--help`/`--version` itself and exits before returning.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = Cli::parse();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = match &cli.config {
        Some(path) => {
            SecureArgParser::validate_argument(&path.to_string_lossy())?;
            Some(path.clone())
        }
        None => None,
    };

    let command = match cli.command {
        Commands::Serve { metrics_port } => {
            let metrics_port = metrics_port.map(|p| SecureArgParser::validate_number("metrics-port", p, 1, 65535)).transpose()?;
            ValidatedCommand::Serve { metrics_port }
        }
        Commands::Health => ValidatedCommand::Health,
        Commands::Recover { cache_dir } => {
            let cache_dir = SecureArgParser::validate_path(&cache_dir.to_string_lossy())?;
            ValidatedCommand::Recover { cache_dir }
        }
    };

    Ok(ValidatedCli { command, verbose: cli.verbose, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(args: &[&str]) -> Result<ValidatedCli, ParseError> {
        let cli = Cli::try_parse_from(args).expect("clap parse should succeed for well-formed test args");
        validate_cli(cli)
    }

    #[test]
    fn serve_with_no_overrides_validates() {
        let validated = build(&["dittofs-payload-demo", "serve"]).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Serve { metrics_port: None }));
    }

    #[test]
    fn serve_rejects_out_of_range_metrics_port() {
        let err = build(&["dittofs-payload-demo", "serve", "--metrics-port", "0"]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
    }

    #[test]
    fn health_validates() {
        let validated = build(&["dittofs-payload-demo", "health"]).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Health));
    }

    #[test]
    fn recover_rejects_nonexistent_cache_dir() {
        let err = build(&["dittofs-payload-demo", "recover", "--cache-dir", "/no/such/cache/dir"]).unwrap_err();
        assert!(matches!(err, ParseError::PathNotFound(_)));
    }

    #[test]
    fn recover_accepts_an_existing_directory() {
        let dir = std::env::temp_dir();
        let validated = build(&["dittofs-payload-demo", "recover", "--cache-dir", &dir.to_string_lossy()]).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Recover { .. }));
    }

    #[test]
    fn verbose_flag_is_carried_through() {
        let validated = build(&["dittofs-payload-demo", "--verbose", "health"]).unwrap();
        assert!(validated.verbose);
    }
}
