// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit code management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions.
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **130/143**: Terminated by SIGINT/SIGTERM
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dittofs_payload_bootstrap::result_to_exit_code;
//!
//! fn run_application() -> Result<(), std::io::Error> {
//!     Ok(())
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     result_to_exit_code(run_application())
//! }
//! ```

use std::fmt;

/// Exit codes following Unix conventions (BSD `sysexits.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,
    /// General error (1)
    Error = 1,
    /// Command line usage error (64)
    UsageError = 64,
    /// Data format error (65)
    DataError = 65,
    /// Cannot open input (66)
    NoInput = 66,
    /// Service unavailable (69)
    Unavailable = 69,
    /// Internal software error (70)
    Software = 70,
    /// System error (71)
    OsError = 71,
    /// I/O error (74)
    IoError = 74,
    /// Temporary failure, retry (75)
    TempFail = 75,
    /// Permission denied (77)
    NoPerm = 77,
    /// Configuration error (78)
    Config = 78,
    /// Interrupted by signal (SIGINT, Ctrl+C) (130)
    Interrupted = 130,
    /// Terminated by signal (SIGTERM) (143)
    Terminated = 143,
}

impl ExitCode {
    /// Converts to `i32` for use with `std::process::exit`.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps an error to an exit code by inspecting its `Display` text.
    ///
    /// This is a best-effort classification for errors (e.g. from
    /// `payload_domain::error::PayloadError`) that don't carry a
    /// dedicated exit code of their own: `CacheFull`/transient failures
    /// map to [`ExitCode::TempFail`], missing blocks to
    /// [`ExitCode::NoInput`], configuration failures to
    /// [`ExitCode::Config`], and everything else to [`ExitCode::Error`].
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let text = error.to_string().to_lowercase();

        if text.contains("permission") || text.contains("access denied") {
            ExitCode::NoPerm
        } else if text.contains("not found") || text.contains("no such") {
            ExitCode::NoInput
        } else if text.contains("cache full") || text.contains("transient") {
            ExitCode::TempFail
        } else if text.contains("config") {
            ExitCode::Config
        } else if text.contains("invalid") || text.contains("argument") {
            ExitCode::UsageError
        } else if text.contains("parse") || text.contains("format") || text.contains("integrity") {
            ExitCode::DataError
        } else if text.contains("io") || text.contains("read") || text.contains("write") {
            ExitCode::IoError
        } else if text.contains("unavailable") || text.contains("not available") || text.contains("closed") {
            ExitCode::Unavailable
        } else {
            ExitCode::Error
        }
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::Unavailable => "Service unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::OsError => "System error",
            ExitCode::IoError => "I/O error",
            ExitCode::TempFail => "Temporary failure, retry",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

/// Maps an error reference to an [`ExitCode`]; a thin wrapper over
/// [`ExitCode::from_error`] for callers holding a `dyn Error`.
pub fn map_error_to_exit_code(error: &dyn std::error::Error) -> ExitCode {
    ExitCode::from_error(error)
}

/// Converts a subcommand's `Result` into a process exit code, printing
/// the error to stderr first.
pub fn result_to_exit_code<T, E: std::error::Error>(result: Result<T, E>) -> std::process::ExitCode {
    match result {
        Ok(_) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {e}");
            map_error_to_exit_code(&e).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_match_sysexits_conventions() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Error.as_i32(), 1);
        assert_eq!(ExitCode::UsageError.as_i32(), 64);
        assert_eq!(ExitCode::Config.as_i32(), 78);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Terminated.as_i32(), 143);
    }

    #[test]
    fn is_success_and_is_error_are_complementary() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::Success.is_error());
        assert!(!ExitCode::Config.is_success());
        assert!(ExitCode::Config.is_error());
    }

    #[test]
    fn from_error_classifies_common_payload_error_text() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        assert_eq!(ExitCode::from_error(&err), ExitCode::NoPerm);

        let err = std::io::Error::other("cache full, retry later");
        assert_eq!(ExitCode::from_error(&err), ExitCode::TempFail);

        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "block not found");
        assert_eq!(ExitCode::from_error(&err), ExitCode::NoInput);
    }

    #[test]
    fn result_to_exit_code_classifies_ok_and_err() {
        let ok: Result<(), std::io::Error> = Ok(());
        assert!(map_error_to_exit_code_opt(&ok).is_none());

        let err: Result<(), std::io::Error> = Err(std::io::Error::other("config invalid"));
        if let Err(e) = &err {
            assert_eq!(map_error_to_exit_code(e), ExitCode::Config);
        }
        // Exercise the real entry point too; std::process::ExitCode is opaque
        // (no PartialEq), so we only assert it doesn't panic.
        let _ = result_to_exit_code(err);
    }

    fn map_error_to_exit_code_opt<T, E: std::error::Error>(result: &Result<T, E>) -> Option<ExitCode> {
        result.as_ref().err().map(|e| map_error_to_exit_code(e))
    }

    #[test]
    fn display_includes_description_and_code() {
        let display = format!("{}", ExitCode::UsageError);
        assert!(display.contains("Command line usage error"));
        assert!(display.contains("64"));
    }
}
