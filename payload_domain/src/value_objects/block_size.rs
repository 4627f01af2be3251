// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Block size value object.
//!
//! A block is the unit of object-storage PUT/GET, SHA-256 hashing, and
//! deduplication. Size is bounded to `[BLOCK_MIN, BLOCK_MAX]` and defaults
//! to 4 MiB.

use std::fmt;

use crate::error::{PayloadError, PayloadResult};

/// Minimum allowed block size: 1 MiB.
pub const BLOCK_MIN: usize = 1024 * 1024;
/// Maximum allowed block size: 16 MiB.
pub const BLOCK_MAX: usize = 16 * 1024 * 1024;
/// Default block size: 4 MiB.
pub const BLOCK_DEFAULT: usize = 4 * 1024 * 1024;

/// Validated block size in bytes, within `[BLOCK_MIN, BLOCK_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockSize(usize);

impl BlockSize {
    /// Creates a `BlockSize`, validating the `[BLOCK_MIN, BLOCK_MAX]` bound.
    pub fn new(bytes: usize) -> PayloadResult<Self> {
        if !(BLOCK_MIN..=BLOCK_MAX).contains(&bytes) {
            return Err(PayloadError::InvalidConfiguration(format!(
                "block size {bytes} out of range [{BLOCK_MIN}, {BLOCK_MAX}]"
            )));
        }
        Ok(Self(bytes))
    }

    /// The size in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }

    /// Builds a `BlockSize` without enforcing `[BLOCK_MIN, BLOCK_MAX]`.
    /// Restricted to the crate: used by addressing tests that exercise
    /// boundary-crossing behavior with small sizes, where the production
    /// bound would only add noise.
    pub(crate) fn new_unchecked(bytes: usize) -> Self {
        Self(bytes)
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self(BLOCK_DEFAULT)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_4mib() {
        assert_eq!(BlockSize::default().bytes(), 4 * 1024 * 1024);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(BlockSize::new(BLOCK_MIN - 1).is_err());
        assert!(BlockSize::new(BLOCK_MAX + 1).is_err());
        assert!(BlockSize::new(BLOCK_MIN).is_ok());
        assert!(BlockSize::new(BLOCK_MAX).is_ok());
    }
}
