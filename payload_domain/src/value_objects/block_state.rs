// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-block lifecycle state and the `PendingBlock` snapshot handed from the
//! cache to the Offloader.

use std::ops::Range;

use crate::value_objects::block_ref::BlockHash;

/// Lifecycle state of a single block within the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// No bytes have been written to this block slot.
    Empty,
    /// Bytes have been written and not yet fully uploaded.
    Dirty,
    /// An upload task currently owns this block's bytes.
    Uploading,
    /// The block's last-written bytes are durably acknowledged by the
    /// `BlockStore` and its hash is recorded (invariant I1).
    Uploaded,
}

impl BlockState {
    /// Only `Uploaded` blocks may be evicted under memory pressure.
    pub fn is_evictable(&self) -> bool {
        matches!(self, BlockState::Uploaded)
    }
}

/// A dirty block handed from the cache to the Offloader for upload.
///
/// `dirty_range` is the byte range within the block's buffer that has been
/// written since the last upload attempt; the Offloader always uploads the
/// whole block buffer, but retains this to decide whether a block is fully
/// covered (worth eager upload) or only partially dirty.
///
/// `generation` is a per-block write counter, incremented on every
/// `write_at` that touches the block. The Offloader echoes it back to
/// `mark_block_uploaded`; the cache discards the transition if the block's
/// generation has advanced since the snapshot was taken, implementing the
/// conservative redirtied-mid-upload resolution (see the design ledger).
#[derive(Debug, Clone)]
pub struct PendingBlock {
    pub chunk_index: u32,
    pub block_index: u32,
    pub data: Vec<u8>,
    pub dirty_range: Range<usize>,
    pub generation: u64,
}

impl PendingBlock {
    pub fn new(chunk_index: u32, block_index: u32, data: Vec<u8>, dirty_range: Range<usize>, generation: u64) -> Self {
        Self { chunk_index, block_index, data, dirty_range, generation }
    }

    /// True if the dirty range covers the entire supplied buffer, i.e. the
    /// block is fully written and a candidate for eager upload.
    pub fn is_fully_dirty(&self) -> bool {
        self.dirty_range.start == 0 && self.dirty_range.end == self.data.len()
    }
}

/// The outcome of successfully uploading a block: hash plus coordinates,
/// used to transition cache state and to build the finalization `BlockRef`
/// list.
#[derive(Debug, Clone, Copy)]
pub struct UploadedBlock {
    pub chunk_index: u32,
    pub block_index: u32,
    pub hash: BlockHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_uploaded_is_evictable() {
        assert!(!BlockState::Empty.is_evictable());
        assert!(!BlockState::Dirty.is_evictable());
        assert!(!BlockState::Uploading.is_evictable());
        assert!(BlockState::Uploaded.is_evictable());
    }

    #[test]
    fn detects_fully_dirty_blocks() {
        let full = PendingBlock::new(0, 0, vec![0u8; 4], 0..4, 1);
        assert!(full.is_fully_dirty());
        let partial = PendingBlock::new(0, 0, vec![0u8; 4], 0..2, 1);
        assert!(!partial.is_fully_dirty());
    }
}
