// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Narrow cache traits: `CacheReader`, `CacheWriter`, `CacheStateManager`.
//!
//! Split into three traits (rather than one `Cache` god-trait) so the
//! Offloader can depend only on the slice of cache behavior it needs,
//! avoiding a circular dependency between `Cache` and `Offloader`
//! implementations that must be interchangeable under test doubles.

use async_trait::async_trait;

use crate::error::PayloadResult;
use crate::value_objects::{BlockHash, PayloadId, PendingBlock};

/// Read-side cache contract used by `PayloadService::read_at`.
#[async_trait]
pub trait CacheReader: Send + Sync {
    /// Copies up to `dest.len()` bytes starting at `offset_in_chunk` within
    /// chunk `chunk_index` into `dest`.
    ///
    /// Returns `Ok(false)` when there is no data cached at this location at
    /// all (a true cache miss, not sparse zero). When `Ok(true)` is
    /// returned with a shorter valid extent than `dest.len()`, the
    /// remaining bytes of `dest` must be zero-filled.
    async fn read_at(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        dest: &mut [u8],
    ) -> PayloadResult<bool>;

    /// Returns `(size, found)`. `found = true, size = 0` is a legitimate
    /// state distinct from `found = false` (no entry at all).
    async fn get_file_size(&self, payload_id: &PayloadId) -> PayloadResult<(u64, bool)>;

    /// Lists every `PayloadID` with live cache state. Used by recovery.
    async fn list_files(&self) -> PayloadResult<Vec<PayloadId>>;
}

/// Write-side cache contract used by `PayloadService::write_at` and
/// `truncate`/`delete`.
#[async_trait]
pub trait CacheWriter: Send + Sync {
    /// Writes `data` at `offset_in_chunk` within `chunk_index`. `data` never
    /// crosses a block boundary; the caller pre-splits via
    /// [`crate::addressing::block_ranges`].
    ///
    /// Returns [`crate::error::PayloadError::CacheFull`] when the dirty-byte
    /// budget is exhausted; the caller is responsible for the bounded
    /// backoff-retry policy.
    async fn write_at(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        data: &[u8],
    ) -> PayloadResult<()>;

    /// Drops block state beyond `new_size`, clipping the dirty range of the
    /// final retained block.
    async fn truncate(&self, payload_id: &PayloadId, new_size: u64) -> PayloadResult<()>;

    /// Destroys all cache state for `payload_id`. Safe to call concurrently
    /// with in-flight uploads, which must become no-ops.
    async fn remove(&self, payload_id: &PayloadId) -> PayloadResult<()>;
}

/// State-transition contract used by the Offloader to drain and acknowledge
/// dirty blocks.
#[async_trait]
pub trait CacheStateManager: Send + Sync {
    /// Snapshots every dirty block for `payload_id`. Multiple concurrent
    /// callers must observe consistent snapshots (no block appears twice,
    /// none is skipped due to a race with a concurrent write).
    async fn get_dirty_blocks(&self, payload_id: &PayloadId) -> PayloadResult<Vec<PendingBlock>>;

    /// Transitions a block from Dirty/Uploading to Uploaded and records its
    /// hash, but only if the block's current write generation still
    /// matches `expected_generation` (the generation observed when the
    /// uploaded bytes were snapshotted via `get_dirty_blocks`). If the
    /// block was re-dirtied since, this is a no-op and the block stays
    /// Dirty — the upload is effectively discarded, per the conservative
    /// resolution of the open question in the design notes. Returns
    /// whether the transition actually applied.
    async fn mark_block_uploaded(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        block_index: u32,
        hash: BlockHash,
        expected_generation: u64,
    ) -> PayloadResult<bool>;
}
