// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `BlockUploader` / `BlockDownloader`: the narrow traits `PayloadService`
//! composes against, plus the small result types they produce.
//!
//! Splitting the Offloader's surface into an upload side and a download
//! side (rather than one `Offloader` trait) lets `PayloadService` depend on
//! exactly the operations each of its methods needs, mirroring the
//! `CacheReader`/`CacheWriter` split.

use async_trait::async_trait;

use crate::error::PayloadResult;
use crate::value_objects::PayloadId;

/// Result of a `flush` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushResult {
    /// True if this call caused finalization to run (all blocks reached
    /// `Uploaded` with no dirty remainder as a result of this flush).
    pub finalized: bool,
    /// True if there was no pending data at all — the file was already
    /// fully flushed.
    pub already_flushed: bool,
}

/// Summary emitted by Offloader startup recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub files_scanned: u64,
    pub blocks_found: u64,
    pub blocks_uploaded: u64,
    pub blocks_failed: u64,
    pub bytes_uploaded: u64,
}

/// The write-path half of the Offloader: eager upload scheduling, flush,
/// and the destructive lifecycle operations that touch the `BlockStore`.
#[async_trait]
pub trait BlockUploader: Send + Sync {
    /// Notifies the Offloader that `(chunk_index, block_index)` was just
    /// written. If the block is now fully covered by dirty data, schedules
    /// a background upload task. Never blocks the caller on the upload
    /// itself.
    async fn on_write_complete(&self, payload_id: &PayloadId, chunk_index: u32, block_index: u32)
        -> PayloadResult<()>;

    /// Requests that remaining dirty blocks for `payload_id` be uploaded
    /// and, once every block is durable, that the finalization callback
    /// fire. Non-blocking for files above the small-file threshold;
    /// synchronous for files at or below it.
    async fn flush(&self, payload_id: &PayloadId) -> PayloadResult<FlushResult>;

    /// Deletes every block of `payload_id` beyond `new_size`, using whole
    /// block granularity (partial-block truncation at the store is out of
    /// scope per the design notes).
    async fn truncate(&self, payload_id: &PayloadId, new_size: u64) -> PayloadResult<()>;

    /// Drops all Offloader-side state for `payload_id` and deletes every
    /// block from the `BlockStore`.
    async fn delete(&self, payload_id: &PayloadId) -> PayloadResult<()>;

    /// Computes the logical file size by listing block keys and inspecting
    /// the last block, for payloads that are no longer in the cache.
    async fn get_file_size(&self, payload_id: &PayloadId) -> PayloadResult<(u64, bool)>;

    /// Runs startup recovery: for every cached `PayloadID`, uploads any
    /// blocks still dirty from before a crash.
    async fn recover(&self) -> PayloadResult<RecoveryStats>;

    /// Stops accepting new operations and drains in-flight work, waiting
    /// at most `shutdown_timeout_ms` before forcing exit.
    async fn close(&self, shutdown_timeout_ms: u64) -> PayloadResult<()>;

    /// Verifies the underlying `BlockStore` is reachable. Returns
    /// [`crate::error::PayloadError::Closed`] after `close()`.
    async fn healthcheck(&self) -> PayloadResult<()>;
}

/// The read-path half of the Offloader: on-demand block download with
/// in-flight deduplication and sparse-zero semantics for missing blocks.
#[async_trait]
pub trait BlockDownloader: Send + Sync {
    /// Ensures every block overlapping `[offset_in_chunk, offset_in_chunk+length)`
    /// of `chunk_index` is present in the cache, fetching from the
    /// `BlockStore` on miss. A missing block in the store is
    /// sparse-legitimate and does not produce an error; it is simply not
    /// installed into the cache, leaving the subsequent cache read to
    /// report a miss that the caller treats as zero.
    async fn ensure_available(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        length: u64,
    ) -> PayloadResult<()>;

    /// As [`BlockDownloader::ensure_available`], but on a primary-cache and
    /// primary-store miss, falls back to `cow_source`'s cache and block
    /// store before giving up. Bytes resolved from the COW source are
    /// copied into the primary cache on a best-effort basis.
    async fn ensure_available_with_cow_source(
        &self,
        payload_id: &PayloadId,
        cow_source: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        length: u64,
    ) -> PayloadResult<()>;
}
