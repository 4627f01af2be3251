// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-memory representation of one cached file's state.
//!
//! Kept separate from [`crate::cache::mmap_cache`] so the bookkeeping
//! structures (per-block state, per-chunk maps) can be unit tested without
//! pulling in the mmap machinery.

use std::collections::HashMap;
use std::ops::Range;

use dittofs_payload_domain::value_objects::{BlockHash, BlockState};

/// One block's buffer and lifecycle state within a chunk.
pub struct BlockSlot {
    pub state: BlockState,
    /// Authoritative copy of the block's bytes, always `block_size` long
    /// (zero-padded beyond the dirty extent).
    pub data: Vec<u8>,
    pub dirty_range: Range<usize>,
    pub hash: Option<BlockHash>,
    /// Incremented on every write; see `PendingBlock::generation`.
    pub generation: u64,
    /// Index into the mmap data region, if a backing file is configured.
    pub mmap_slot: Option<usize>,
}

impl BlockSlot {
    pub fn new_empty(block_size: usize) -> Self {
        Self {
            state: BlockState::Empty,
            data: vec![0u8; block_size],
            dirty_range: 0..0,
            hash: None,
            generation: 0,
            mmap_slot: None,
        }
    }

    pub fn union_dirty_range(&mut self, new_range: Range<usize>) {
        if self.dirty_range.is_empty() {
            self.dirty_range = new_range;
        } else {
            self.dirty_range =
                self.dirty_range.start.min(new_range.start)..self.dirty_range.end.max(new_range.end);
        }
    }
}

/// One 64 MiB chunk's block slots, keyed by block index.
#[derive(Default)]
pub struct ChunkEntry {
    pub blocks: HashMap<u32, BlockSlot>,
}

/// All live state for one `PayloadID`.
#[derive(Default)]
pub struct PayloadEntry {
    pub size: u64,
    pub chunks: HashMap<u32, ChunkEntry>,
}

impl PayloadEntry {
    pub fn touch_size(&mut self, candidate: u64) {
        self.size = self.size.max(candidate);
    }
}
