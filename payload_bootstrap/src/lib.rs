// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap module
//!
//! Process entry-point concerns for the `dittofs-payload-demo` binary,
//! kept outside the domain/infrastructure layers in `payload_domain` and
//! `payload`:
//!
//! - **CLI** - secure argument parsing for the `serve` / `health` /
//!   `recover` subcommands
//! - **Signal handling** - graceful shutdown on SIGTERM/SIGINT/SIGHUP
//! - **Shutdown coordination** - cancellation tokens with a grace period
//! - **Platform abstraction** - CPU count, page size, privilege checks
//! - **Exit codes** - `sysexits.h`-style process exit status
//!
//! ## Module structure
//!
//! - `platform` - OS abstraction (Unix/Windows)
//! - `signals` - signal handling (SIGTERM, SIGINT, SIGHUP)
//! - `cli` - secure argument parsing for the demo binary
//! - `exit_code` - Unix exit code enumeration
//! - `logger` - bootstrap-phase logging, before `payload::logging::init` runs
//! - `shutdown` - shutdown coordination

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

pub use cli::{parse_and_validate, ValidatedCli, ValidatedCommand};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};

/// Parses and validates the demo binary's CLI arguments.
///
/// The caller is responsible for running the selected subcommand and
/// mapping the result to an [`ExitCode`] via [`result_to_exit_code`].
///
/// # Errors
///
/// Returns [`cli::ParseError`] if parsing or validation fails. `clap`
/// handles `--help`/`--version` itself and exits the process before this
/// function returns.
pub fn bootstrap_cli() -> Result<ValidatedCli, cli::ParseError> {
    cli::parse_and_validate()
}
