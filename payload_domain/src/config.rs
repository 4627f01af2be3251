// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Validated configuration value objects for the payload data plane.
//!
//! `PayloadServiceConfig` aggregates the sub-configs named in the external
//! interface list: cache, offloader, transfer queue, and block/chunk
//! layout. Construction validates every documented constraint and is
//! fatal-at-construction on violation, matching the teacher's
//! `FileIOConfig` pattern of validating once at the edge rather than at
//! every call site.

use std::path::PathBuf;

use crate::error::{PayloadError, PayloadResult};
use crate::value_objects::{BlockSize, ChunkSize};

/// Cache sizing and durability configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// In-memory budget; also the dirty-bytes backpressure threshold.
    pub capacity_bytes: u64,
    /// Backing file for the mmap region. `None` means heap-only (no crash
    /// recovery).
    pub backing_file: Option<PathBuf>,
}

impl CacheConfig {
    pub fn validate(&self) -> PayloadResult<()> {
        if self.capacity_bytes == 0 {
            return Err(PayloadError::Config("cache.capacity_bytes is required and must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Offloader concurrency and flush-policy configuration.
#[derive(Debug, Clone, Copy)]
pub struct OffloaderConfig {
    pub parallel_uploads: usize,
    pub parallel_downloads: usize,
    /// Files at or below this size flush synchronously. 0 disables the
    /// optimization.
    pub small_file_threshold_bytes: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for OffloaderConfig {
    fn default() -> Self {
        Self {
            parallel_uploads: 4,
            parallel_downloads: 4,
            small_file_threshold_bytes: 0,
            shutdown_timeout_ms: 30_000,
        }
    }
}

impl OffloaderConfig {
    pub fn validate(&self) -> PayloadResult<()> {
        if self.parallel_uploads == 0 {
            return Err(PayloadError::Config("offloader.parallel_uploads must be >= 1".to_string()));
        }
        if self.parallel_downloads == 0 {
            return Err(PayloadError::Config("offloader.parallel_downloads must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Transfer queue sizing configuration.
#[derive(Debug, Clone, Copy)]
pub struct TransferQueueConfig {
    pub size: usize,
    pub workers: usize,
}

impl Default for TransferQueueConfig {
    fn default() -> Self {
        Self { size: 1000, workers: 4 }
    }
}

impl TransferQueueConfig {
    pub fn validate(&self) -> PayloadResult<()> {
        if self.size == 0 {
            return Err(PayloadError::Config("transfer_queue.size must be >= 1".to_string()));
        }
        if self.workers == 0 {
            return Err(PayloadError::Config("transfer_queue.workers must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Block/chunk size layout, validated together since chunk size is
/// expressed as a multiple of block size.
#[derive(Debug, Clone, Copy)]
pub struct BlockLayoutConfig {
    pub block_size: BlockSize,
    pub chunk_size: ChunkSize,
}

impl BlockLayoutConfig {
    /// Validates `block_size_bytes` against `[BLOCK_MIN, BLOCK_MAX]` and
    /// `chunk_size_bytes` as a power-of-two multiple of it.
    pub fn new(block_size_bytes: usize, chunk_size_bytes: usize) -> PayloadResult<Self> {
        let block_size = BlockSize::new(block_size_bytes)
            .map_err(|e| PayloadError::InvalidConfiguration(format!("block.size_bytes: {e}")))?;
        let chunk_size = ChunkSize::new(chunk_size_bytes, block_size)
            .map_err(|e| PayloadError::InvalidConfiguration(format!("chunk.size_bytes: {e}")))?;
        Ok(Self { block_size, chunk_size })
    }
}

impl Default for BlockLayoutConfig {
    fn default() -> Self {
        Self { block_size: BlockSize::default(), chunk_size: ChunkSize::default() }
    }
}

/// Aggregate, validated configuration for the payload data plane.
#[derive(Debug, Clone)]
pub struct PayloadServiceConfig {
    pub cache: CacheConfig,
    pub offloader: OffloaderConfig,
    pub transfer_queue: TransferQueueConfig,
    pub block_layout: BlockLayoutConfig,
}

impl PayloadServiceConfig {
    /// Validates every sub-config, returning the first violation
    /// encountered. Construction is the only place these constraints are
    /// checked; once built, a `PayloadServiceConfig` is known-good.
    pub fn new(
        cache: CacheConfig,
        offloader: OffloaderConfig,
        transfer_queue: TransferQueueConfig,
        block_layout: BlockLayoutConfig,
    ) -> PayloadResult<Self> {
        cache.validate()?;
        offloader.validate()?;
        transfer_queue.validate()?;
        Ok(Self { cache, offloader, transfer_queue, block_layout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_cache_capacity() {
        let cache = CacheConfig { capacity_bytes: 0, backing_file: None };
        let result =
            PayloadServiceConfig::new(cache, OffloaderConfig::default(), TransferQueueConfig::default(), BlockLayoutConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let cache = CacheConfig { capacity_bytes: 64 * 1024 * 1024, backing_file: None };
        let result =
            PayloadServiceConfig::new(cache, OffloaderConfig::default(), TransferQueueConfig::default(), BlockLayoutConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn block_layout_rejects_bad_chunk_multiple() {
        assert!(BlockLayoutConfig::new(4 * 1024 * 1024, 10 * 1024 * 1024).is_err());
        assert!(BlockLayoutConfig::new(4 * 1024 * 1024, 64 * 1024 * 1024).is_ok());
    }
}
