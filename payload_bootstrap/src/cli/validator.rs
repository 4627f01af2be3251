// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure command-line argument validation
//!
//! Security-first validation applied to every path and string argument
//! parsed by `clap` before it reaches the demo binary.
//!
//! ## Dangerous patterns detected
//!
//! `..` (path traversal), `~` (home expansion), `$` (variable expansion),
//! backticks and `;`/`&`/`|`/`>`/`<` (shell metacharacters), plus null
//! bytes and newlines.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum single argument length.
const MAX_ARG_LENGTH: usize = 1000;

/// Maximum path length.
const MAX_PATH_LENGTH: usize = 4096;

const DANGEROUS_PATTERNS: &[&str] = &["..", "~", "$", "`", ";", "&", "|", ">", "<", "\n", "\r", "\0"];

const PROTECTED_DIRS: &[&str] = &["/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev"];

/// Secure argument validation errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("dangerous pattern detected in argument: {pattern} in {arg}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("path exceeds maximum length (max {MAX_PATH_LENGTH})")]
    PathTooLong,

    #[error("access to protected system directory denied: {0}")]
    ProtectedDirectory(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

/// Validates CLI arguments before they're trusted by the demo binary.
pub struct SecureArgParser;

impl SecureArgParser {
    /// Checks a single argument for length and dangerous shell patterns.
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(arg.chars().take(50).collect::<String>() + "..."));
        }

        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern { pattern: pattern.to_string(), arg: arg.to_string() });
            }
        }

        Ok(())
    }

    /// Validates and canonicalizes a path that must already exist.
    pub fn validate_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path).map_err(|e| match e {
            ParseError::ArgumentTooLong(_) => ParseError::InvalidPath(format!("path too long: {path}")),
            ParseError::DangerousPattern { pattern, .. } => {
                ParseError::InvalidPath(format!("path contains dangerous pattern '{pattern}': {path}"))
            }
            other => other,
        })?;

        let path_obj = Path::new(path);
        let canonical = path_obj.canonicalize().map_err(|e| {
            if !path_obj.exists() {
                ParseError::PathNotFound(path.to_string())
            } else {
                ParseError::InvalidPath(format!("{path}: {e}"))
            }
        })?;

        if canonical.to_string_lossy().len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }

        for protected in PROTECTED_DIRS {
            if canonical.starts_with(protected) {
                return Err(ParseError::ProtectedDirectory(canonical.display().to_string()));
            }
        }

        Ok(canonical)
    }

    /// Validates a numeric argument within an inclusive range.
    pub fn validate_number<T>(arg_name: &str, value: T, min: T, max: T) -> Result<T, ParseError>
    where
        T: PartialOrd + std::fmt::Display,
    {
        if value < min {
            return Err(ParseError::InvalidValue { arg: arg_name.to_string(), reason: format!("{value} is less than minimum {min}") });
        }
        if value > max {
            return Err(ParseError::InvalidValue { arg: arg_name.to_string(), reason: format!("{value} is greater than maximum {max}") });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_arguments() {
        assert!(SecureArgParser::validate_argument("safe-arg").is_ok());
        assert!(SecureArgParser::validate_argument("config.toml").is_ok());
    }

    #[test]
    fn rejects_too_long_arguments() {
        let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
        assert!(matches!(SecureArgParser::validate_argument(&long_arg), Err(ParseError::ArgumentTooLong(_))));
    }

    #[test]
    fn detects_dangerous_patterns() {
        for arg in ["../etc/passwd", "~/.ssh/id_rsa", "$(whoami)", "`ls`", "a;rm -rf /", "a|b", "a>b"] {
            assert!(
                matches!(SecureArgParser::validate_argument(arg), Err(ParseError::DangerousPattern { .. })),
                "failed to flag dangerous pattern in {arg}"
            );
        }
    }

    #[test]
    fn rejects_nonexistent_paths() {
        assert!(matches!(SecureArgParser::validate_path("/no/such/path/should/exist"), Err(ParseError::PathNotFound(_))));
    }

    #[test]
    fn rejects_protected_directories() {
        assert!(matches!(SecureArgParser::validate_path("/etc"), Err(ParseError::ProtectedDirectory(_))));
    }

    #[test]
    fn enforces_numeric_ranges() {
        assert_eq!(SecureArgParser::validate_number("metrics-port", 9090u32, 1, 65535).unwrap(), 9090);
        assert!(SecureArgParser::validate_number("metrics-port", 0u32, 1, 65535).is_err());
    }
}
