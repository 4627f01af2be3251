// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Chunk size value object.
//!
//! A chunk is a 64 MiB logical segment of a file; it is the unit of
//! metadata indexing and lazy loading. A chunk must divide evenly into a
//! whole number of blocks, and that number must be a power of two.

use std::fmt;

use crate::error::{PayloadError, PayloadResult};
use crate::value_objects::block_size::BlockSize;

/// Default chunk size: 64 MiB.
pub const CHUNK_DEFAULT: usize = 64 * 1024 * 1024;

/// Validated chunk size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Creates a `ChunkSize`, validating it against a `BlockSize`: the
    /// chunk must be an exact multiple of the block size, and that
    /// multiple must be a power of two (so `chunk_index`/`block_index`
    /// arithmetic stays a shift, matching the reference 16-blocks-per-chunk
    /// layout at the default sizes).
    pub fn new(bytes: usize, block_size: BlockSize) -> PayloadResult<Self> {
        if bytes == 0 || bytes % block_size.bytes() != 0 {
            return Err(PayloadError::InvalidConfiguration(format!(
                "chunk size {bytes} must be a positive multiple of block size {}",
                block_size.bytes()
            )));
        }
        let blocks_per_chunk = bytes / block_size.bytes();
        if !blocks_per_chunk.is_power_of_two() {
            return Err(PayloadError::InvalidConfiguration(format!(
                "chunk size {bytes} / block size {} = {blocks_per_chunk} blocks per chunk, which is not a power of two",
                block_size.bytes()
            )));
        }
        Ok(Self(bytes))
    }

    /// The size in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }

    /// Number of blocks per chunk at the given block size. Caller must
    /// supply the same `block_size` used at construction.
    pub fn blocks_per_chunk(&self, block_size: BlockSize) -> u32 {
        (self.0 / block_size.bytes()) as u32
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(CHUNK_DEFAULT)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_64mib_with_16_blocks_per_chunk() {
        let cs = ChunkSize::default();
        assert_eq!(cs.bytes(), 64 * 1024 * 1024);
        assert_eq!(cs.blocks_per_chunk(BlockSize::default()), 16);
    }

    #[test]
    fn rejects_non_multiple_and_non_power_of_two() {
        let bs = BlockSize::default();
        assert!(ChunkSize::new(0, bs).is_err());
        assert!(ChunkSize::new(bs.bytes() + 1, bs).is_err());
        // 3 blocks per chunk is a multiple but not a power of two.
        assert!(ChunkSize::new(bs.bytes() * 3, bs).is_err());
        assert!(ChunkSize::new(bs.bytes() * 4, bs).is_ok());
    }
}
