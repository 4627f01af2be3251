// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Wire-format key identifying a single block in a `BlockStore`.
//!
//! The format `"{payloadId}/chunk-{chunkIdx}/block-{blockIdx}"` is part of
//! the external contract: older data must remain readable, so the format,
//! decimal encoding, and absence of zero-padding are all load-bearing.

use std::fmt;

use crate::error::{PayloadError, PayloadResult};
use crate::value_objects::payload_id::PayloadId;

/// A fully-qualified block key, e.g. `"p1/chunk-0/block-3"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    payload_id: PayloadId,
    chunk_index: u32,
    block_index: u32,
}

impl BlockKey {
    /// Builds a key from its components.
    pub fn new(payload_id: PayloadId, chunk_index: u32, block_index: u32) -> Self {
        Self { payload_id, chunk_index, block_index }
    }

    /// The prefix shared by every block of `payload_id`, e.g. `"p1/"`.
    /// Used by `list_by_prefix` / `delete_by_prefix`.
    pub fn prefix_for(payload_id: &PayloadId) -> String {
        format!("{payload_id}/")
    }

    /// The prefix shared by every block of a given chunk, e.g. `"p1/chunk-0/"`.
    pub fn chunk_prefix_for(payload_id: &PayloadId, chunk_index: u32) -> String {
        format!("{payload_id}/chunk-{chunk_index}/")
    }

    pub fn payload_id(&self) -> &PayloadId {
        &self.payload_id
    }

    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    /// Parses a key in `"{payloadId}/chunk-{n}/block-{m}"` format.
    pub fn parse(raw: &str) -> PayloadResult<Self> {
        let mut parts = raw.splitn(3, '/');
        let payload_raw = parts.next().ok_or_else(|| PayloadError::InvalidBlockKey(raw.to_string()))?;
        let chunk_part = parts.next().ok_or_else(|| PayloadError::InvalidBlockKey(raw.to_string()))?;
        let block_part = parts.next().ok_or_else(|| PayloadError::InvalidBlockKey(raw.to_string()))?;

        let chunk_index = chunk_part
            .strip_prefix("chunk-")
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| PayloadError::InvalidBlockKey(raw.to_string()))?;
        let block_index = block_part
            .strip_prefix("block-")
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| PayloadError::InvalidBlockKey(raw.to_string()))?;

        let payload_id = PayloadId::new(payload_raw)?;
        Ok(Self::new(payload_id, chunk_index, block_index))
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/chunk-{}/block-{}", self.payload_id, self.chunk_index, self.block_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_in_wire_format() {
        let key = BlockKey::new(PayloadId::new("p1").unwrap(), 0, 3);
        assert_eq!(key.to_string(), "p1/chunk-0/block-3");
    }

    #[test]
    fn round_trips_through_parse() {
        let key = BlockKey::new(PayloadId::new("p1").unwrap(), 12, 5);
        let parsed = BlockKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(BlockKey::parse("p1/chunk-x/block-0").is_err());
        assert!(BlockKey::parse("p1/chunk-0").is_err());
        assert!(BlockKey::parse("not-a-key").is_err());
    }

    #[test]
    fn prefixes_match_documented_layout() {
        let id = PayloadId::new("p2").unwrap();
        assert_eq!(BlockKey::prefix_for(&id), "p2/");
        assert_eq!(BlockKey::chunk_prefix_for(&id, 1), "p2/chunk-1/");
    }
}
