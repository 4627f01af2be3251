// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Opaque identifier of a file's content.
//!
//! `PayloadID` is supplied by the metadata layer, not generated here: the
//! data plane never mints its own identities. It is the sole cache key and
//! the prefix of every `BlockKey`. The newtype exists so callers cannot
//! accidentally concatenate raw strings when forming a `BlockKey` (see
//! `BlockKey::new`).

use std::fmt;

use crate::error::{PayloadError, PayloadResult};

/// Opaque, globally unique identifier of a file's content.
///
/// `PayloadID` is treated as a printable byte string by this crate. It must
/// not contain the `/` character, since `BlockKey` uses `/` as a field
/// separator in its wire format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PayloadId(String);

impl PayloadId {
    /// Creates a `PayloadId` from a caller-supplied string.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidBlockKey`] if `raw` is empty or
    /// contains `/`, since either would corrupt the `BlockKey` wire format.
    pub fn new(raw: impl Into<String>) -> PayloadResult<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PayloadError::InvalidBlockKey("payload id must not be empty".to_string()));
        }
        if raw.contains('/') {
            return Err(PayloadError::InvalidBlockKey(format!(
                "payload id {raw:?} must not contain '/'"
            )));
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PayloadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_slashed_ids() {
        assert!(PayloadId::new("").is_err());
        assert!(PayloadId::new("a/b").is_err());
    }

    #[test]
    fn accepts_and_displays_plain_ids() {
        let id = PayloadId::new("p1").unwrap();
        assert_eq!(id.as_str(), "p1");
        assert_eq!(id.to_string(), "p1");
    }
}
