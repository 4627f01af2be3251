// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Reference to an uploaded block: its coordinates and content hash.
//!
//! The ordered sequence of `BlockRef`s for a `PayloadID`, once all uploads
//! complete, is what the metadata layer hashes to form the finalized
//! object identity.

use std::cmp::Ordering;

/// SHA-256 digest, stored as raw bytes.
pub type BlockHash = [u8; 32];

/// `(chunkIdx, blockIdx, hash)` for one uploaded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub chunk_index: u32,
    pub block_index: u32,
    pub hash: BlockHash,
}

impl BlockRef {
    pub fn new(chunk_index: u32, block_index: u32, hash: BlockHash) -> Self {
        Self { chunk_index, block_index, hash }
    }

    /// Hex encoding of the content hash, for logging and the `ObjectStore`
    /// catalog key.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// `BlockRef`s sort by `(chunkIdx, blockIdx)` ascending, the order the
/// finalization callback must deliver them in (invariant I4).
impl PartialOrd for BlockRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockRef {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.chunk_index, self.block_index).cmp(&(other.chunk_index, other.block_index))
    }
}

/// Sorts block refs by `(chunkIdx, blockIdx)` ascending, as required before
/// delivering them to a finalization callback.
pub fn sorted_block_refs(mut refs: Vec<BlockRef>) -> Vec<BlockRef> {
    refs.sort();
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(byte: u8) -> BlockHash {
        [byte; 32]
    }

    #[test]
    fn sorts_by_chunk_then_block() {
        let refs = vec![
            BlockRef::new(1, 0, hash_of(1)),
            BlockRef::new(0, 1, hash_of(2)),
            BlockRef::new(0, 0, hash_of(3)),
        ];
        let sorted = sorted_block_refs(refs);
        assert_eq!(
            sorted.iter().map(|r| (r.chunk_index, r.block_index)).collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 0)]
        );
    }

    #[test]
    fn hash_hex_round_trips_length() {
        let r = BlockRef::new(0, 0, hash_of(0xab));
        assert_eq!(r.hash_hex().len(), 64);
    }
}
