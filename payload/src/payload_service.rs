// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `PayloadService`: the public façade over the cache and the Offloader.
//! Pure composition — no concurrency state of its own beyond the two
//! collaborators it holds.

use std::sync::Arc;
use std::time::Duration;

use dittofs_payload_domain::addressing::block_ranges;
use dittofs_payload_domain::config::BlockLayoutConfig;
use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::{BlockDownloader, BlockUploader, Cache, FlushResult};
use dittofs_payload_domain::value_objects::PayloadId;

use crate::offloader::Offloader;

const CACHE_FULL_INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const CACHE_FULL_MAX_BACKOFF: Duration = Duration::from_millis(100);
const CACHE_FULL_MAX_ATTEMPTS: u32 = 10;

/// Composes the cache (hot path for both reads and writes) with the
/// Offloader (upload/download orchestration against the `BlockStore`).
pub struct PayloadService {
    cache: Arc<dyn Cache>,
    offloader: Arc<Offloader>,
    block_layout: BlockLayoutConfig,
}

impl PayloadService {
    pub fn new(cache: Arc<dyn Cache>, offloader: Arc<Offloader>, block_layout: BlockLayoutConfig) -> Self {
        Self { cache, offloader, block_layout }
    }

    fn chunk_relative_offset(&self, block_index: u32, offset_in_block: u64) -> u64 {
        block_index as u64 * self.block_layout.block_size.bytes() as u64 + offset_in_block
    }

    /// Reads `buf.len()` bytes of `payload_id` starting at `offset`. A
    /// cache miss that persists after `ensure_available` is sparse-legitimate
    /// and zero-fills the corresponding span of `buf` — the only place this
    /// read path applies sparse semantics.
    pub async fn read_at(&self, payload_id: &PayloadId, buf: &mut [u8], offset: u64) -> PayloadResult<()> {
        for range in block_ranges(offset, buf.len() as u64, self.block_layout.block_size, self.block_layout.chunk_size) {
            let chunk_offset = self.chunk_relative_offset(range.block_index, range.offset_in_block);
            let dest = &mut buf[range.buf_offset as usize..(range.buf_offset + range.length) as usize];

            if self.cache.read_at(payload_id, range.chunk_index, chunk_offset, dest).await? {
                continue;
            }
            self.offloader.ensure_available(payload_id, range.chunk_index, chunk_offset, range.length).await?;
            if !self.cache.read_at(payload_id, range.chunk_index, chunk_offset, dest).await? {
                dest.fill(0);
            }
        }
        Ok(())
    }

    /// As [`Self::read_at`], but falls back to `cow_source`'s data when the
    /// primary payload has no block of its own yet (copy-on-write clones).
    pub async fn read_at_with_cow_source(
        &self,
        payload_id: &PayloadId,
        cow_source: &PayloadId,
        buf: &mut [u8],
        offset: u64,
    ) -> PayloadResult<()> {
        for range in block_ranges(offset, buf.len() as u64, self.block_layout.block_size, self.block_layout.chunk_size) {
            let chunk_offset = self.chunk_relative_offset(range.block_index, range.offset_in_block);
            let dest = &mut buf[range.buf_offset as usize..(range.buf_offset + range.length) as usize];

            if self.cache.read_at(payload_id, range.chunk_index, chunk_offset, dest).await? {
                continue;
            }
            self.offloader
                .ensure_available_with_cow_source(payload_id, cow_source, range.chunk_index, chunk_offset, range.length)
                .await?;
            if !self.cache.read_at(payload_id, range.chunk_index, chunk_offset, dest).await? {
                dest.fill(0);
            }
        }
        Ok(())
    }

    /// Writes `data` at `offset`, retrying `ErrCacheFull` with bounded
    /// exponential backoff so the background uploader can drain dirty
    /// bytes, then notifies the Offloader of each fully-written block.
    pub async fn write_at(&self, payload_id: &PayloadId, data: &[u8], offset: u64) -> PayloadResult<()> {
        for range in block_ranges(offset, data.len() as u64, self.block_layout.block_size, self.block_layout.chunk_size) {
            let chunk_offset = self.chunk_relative_offset(range.block_index, range.offset_in_block);
            let slice = &data[range.buf_offset as usize..(range.buf_offset + range.length) as usize];

            self.write_block_with_backoff(payload_id, range.chunk_index, chunk_offset, slice).await?;
            self.offloader.on_write_complete(payload_id, range.chunk_index, range.block_index).await?;
        }
        Ok(())
    }

    async fn write_block_with_backoff(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        chunk_offset: u64,
        data: &[u8],
    ) -> PayloadResult<()> {
        let mut backoff = CACHE_FULL_INITIAL_BACKOFF;
        for attempt in 0..CACHE_FULL_MAX_ATTEMPTS {
            match self.cache.write_at(payload_id, chunk_index, chunk_offset, data).await {
                Ok(()) => return Ok(()),
                Err(PayloadError::CacheFull) if attempt + 1 < CACHE_FULL_MAX_ATTEMPTS => {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(CACHE_FULL_MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
        Err(PayloadError::CacheFull)
    }

    pub async fn truncate(&self, payload_id: &PayloadId, new_size: u64) -> PayloadResult<()> {
        self.cache.truncate(payload_id, new_size).await?;
        self.offloader.truncate(payload_id, new_size).await
    }

    pub async fn delete(&self, payload_id: &PayloadId) -> PayloadResult<()> {
        self.cache.remove(payload_id).await?;
        self.offloader.delete(payload_id).await
    }

    pub async fn flush(&self, payload_id: &PayloadId) -> PayloadResult<FlushResult> {
        self.offloader.flush(payload_id).await
    }

    /// Prefers the cache's view of size; falls back to the Offloader's
    /// block-listing-based estimate for payloads no longer cached.
    pub async fn get_size(&self, payload_id: &PayloadId) -> PayloadResult<(u64, bool)> {
        let (size, found) = self.cache.get_file_size(payload_id).await?;
        if found {
            return Ok((size, true));
        }
        self.offloader.get_file_size(payload_id).await
    }

    /// Zero-length files that exist only in the cache still count as
    /// existing, matching `get_size`'s `(0, true)` distinction from "not
    /// found at all".
    pub async fn exists(&self, payload_id: &PayloadId) -> PayloadResult<bool> {
        let (_, found) = self.get_size(payload_id).await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dittofs_payload_domain::config::{BlockLayoutConfig, OffloaderConfig};
    use dittofs_payload_domain::services::{ChecksumService, FinalizationCallback, Sha256ChecksumService};
    use dittofs_payload_domain::value_objects::BlockRef;

    use crate::blockstore::InMemoryBlockStore;
    use crate::cache::MmapCache;
    use crate::objectstore::InMemoryObjectStore;

    struct NoopFinalization;
    impl FinalizationCallback for NoopFinalization {
        fn on_finalized(&self, _payload_id: &PayloadId, _block_refs: Vec<BlockRef>) {}
    }

    async fn build_service() -> PayloadService {
        let block_layout = BlockLayoutConfig::default();
        let cache = Arc::new(MmapCache::open(
            &dittofs_payload_domain::config::CacheConfig { capacity_bytes: 256 * 1024 * 1024, backing_file: None },
            block_layout.block_size.bytes(),
            block_layout.chunk_size.bytes() as u64,
        ).unwrap()) as Arc<dyn Cache>;

        let block_store = Arc::new(InMemoryBlockStore::new());
        let object_store = Arc::new(InMemoryObjectStore::new());
        let checksum: Arc<dyn ChecksumService> = Arc::new(Sha256ChecksumService);
        let offloader = Offloader::new(
            block_store,
            object_store,
            cache.clone(),
            checksum,
            Arc::new(NoopFinalization),
            block_layout,
            OffloaderConfig::default(),
        );

        PayloadService::new(cache, offloader, block_layout)
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_the_facade() {
        let service = build_service().await;
        let id = PayloadId::new("f1").unwrap();

        service.write_at(&id, b"hello world", 0).await.unwrap();
        let mut buf = [0u8; 11];
        service.read_at(&id, &mut buf, 0).await.unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[tokio::test]
    async fn read_past_end_is_sparse_zero() {
        let service = build_service().await;
        let id = PayloadId::new("f2").unwrap();

        service.write_at(&id, b"abc", 0).await.unwrap();
        let mut buf = [0xFFu8; 8];
        service.read_at(&id, &mut buf, 100).await.unwrap();
        assert_eq!(buf, [0u8; 8]);
    }

    #[tokio::test]
    async fn exists_is_false_before_any_write() {
        let service = build_service().await;
        let id = PayloadId::new("f3").unwrap();
        assert!(!service.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_clears_existence() {
        let service = build_service().await;
        let id = PayloadId::new("f4").unwrap();

        service.write_at(&id, b"data", 0).await.unwrap();
        assert!(service.exists(&id).await.unwrap());

        service.delete(&id).await.unwrap();
        assert!(!service.exists(&id).await.unwrap());
    }
}
