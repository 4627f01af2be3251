// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end scenarios against the public `payload_service`/`offloader`
//! surface: write/flush/readback, dedup, truncate, delete, copy-on-write,
//! and close-with-drain.

use std::sync::{Arc, Mutex};

use dittofs_payload::blockstore::InMemoryBlockStore;
use dittofs_payload::cache::MmapCache;
use dittofs_payload::objectstore::InMemoryObjectStore;
use dittofs_payload::offloader::Offloader;
use dittofs_payload::PayloadService;

use dittofs_payload_domain::config::{BlockLayoutConfig, CacheConfig, OffloaderConfig};
use dittofs_payload_domain::error::PayloadError;
use dittofs_payload_domain::services::{BlockStore, BlockUploader, ChecksumService, FinalizationCallback, ObjectStore, Sha256ChecksumService};
use dittofs_payload_domain::value_objects::{BlockKey, BlockRef, PayloadId};

#[derive(Default, Clone)]
struct RecordingFinalization {
    calls: Arc<Mutex<Vec<(PayloadId, Vec<BlockRef>)>>>,
}

impl FinalizationCallback for RecordingFinalization {
    fn on_finalized(&self, payload_id: &PayloadId, block_refs: Vec<BlockRef>) {
        self.calls.lock().unwrap().push((payload_id.clone(), block_refs));
    }
}

struct Harness {
    service: PayloadService,
    offloader: Arc<Offloader>,
    block_store: Arc<InMemoryBlockStore>,
    object_store: Arc<InMemoryObjectStore>,
    finalization: RecordingFinalization,
}

fn build_harness() -> Harness {
    let block_layout = BlockLayoutConfig::default();
    let cache = Arc::new(
        MmapCache::open(&CacheConfig { capacity_bytes: 256 * 1024 * 1024, backing_file: None }, block_layout.block_size.bytes(), block_layout.chunk_size.bytes() as u64)
            .unwrap(),
    );
    let block_store = Arc::new(InMemoryBlockStore::new());
    let object_store = Arc::new(InMemoryObjectStore::new());
    let finalization = RecordingFinalization::default();

    let offloader = Offloader::new(
        block_store.clone(),
        object_store.clone(),
        cache.clone(),
        Arc::new(Sha256ChecksumService),
        Arc::new(finalization.clone()),
        block_layout,
        OffloaderConfig::default(),
    );

    let service = PayloadService::new(cache, offloader.clone(), block_layout);
    Harness { service, offloader, block_store, object_store, finalization }
}

fn block_key(payload: &str, chunk: u32, block: u32) -> BlockKey {
    BlockKey::new(PayloadId::new(payload).unwrap(), chunk, block)
}

/// S1: single small write, flush, and the block lands in the BlockStore
/// with its hash appearing once in the ObjectStore.
#[tokio::test]
async fn s1_write_flush_lands_in_block_store() {
    let h = build_harness();
    let id = PayloadId::new("p1").unwrap();

    h.service.write_at(&id, b"hello world", 0).await.unwrap();
    let (size, found) = h.service.get_size(&id).await.unwrap();
    assert!(found);
    assert_eq!(size, 11);

    let result = h.service.flush(&id).await.unwrap();
    assert!(result.finalized);

    let bytes = h.block_store.get(&block_key("p1", 0, 0)).await.unwrap();
    assert_eq!(bytes, b"hello world");

    let hash = Sha256ChecksumService.hash_block(b"hello world");
    let (exists, refcount) = h.object_store.lookup(&hash).await.unwrap();
    assert!(exists);
    assert_eq!(refcount, 1);
}

/// S2: identical content written to two distinct blocks of the same
/// payload dedups to one physical put and a refcount of 2, and the
/// finalization callback sees both block refs with the same hash.
#[tokio::test]
async fn s2_identical_blocks_dedup_within_one_payload() {
    let h = build_harness();
    let id = PayloadId::new("p2").unwrap();
    let block_layout = BlockLayoutConfig::default();
    let zeros = vec![0u8; block_layout.block_size.bytes()];

    h.service.write_at(&id, &zeros, 0).await.unwrap();
    h.service.write_at(&id, &zeros, block_layout.block_size.bytes() as u64).await.unwrap();
    h.service.flush(&id).await.unwrap();

    let hash = Sha256ChecksumService.hash_block(&zeros);
    let (exists, refcount) = h.object_store.lookup(&hash).await.unwrap();
    assert!(exists);
    assert_eq!(refcount, 2);

    let calls = h.finalization.calls.lock().unwrap();
    let (_, refs) = calls.iter().find(|(pid, _)| *pid == id).expect("finalization fired for p2");
    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|r| r.hash == hash));
}

/// S3: truncating drops whole blocks beyond the new size and reads past
/// the old content but within the new size return sparse zero.
#[tokio::test]
async fn s3_truncate_drops_trailing_blocks_and_stays_sparse() {
    let h = build_harness();
    let id = PayloadId::new("p3").unwrap();
    let block_layout = BlockLayoutConfig::default();
    let block_size = block_layout.block_size.bytes() as u64;
    let zeros = vec![0u8; block_layout.block_size.bytes()];

    h.service.write_at(&id, &zeros, 0).await.unwrap();
    h.service.write_at(&id, &zeros, block_size).await.unwrap();
    h.service.flush(&id).await.unwrap();

    let new_size = block_size + 1000;
    h.service.truncate(&id, new_size).await.unwrap();

    let keys = h.block_store.list_by_prefix("p3/").await.unwrap();
    let mut names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["p3/chunk-0/block-0".to_string(), "p3/chunk-0/block-1".to_string()]);

    let (size, found) = h.service.get_size(&id).await.unwrap();
    assert!(found);
    assert_eq!(size, new_size);

    let mut buf = [0xFFu8; 2000];
    h.service.read_at(&id, &mut buf, block_size).await.unwrap();
    assert_eq!(&buf[..], &[0u8; 2000][..]);
}

/// S4: deleting a payload clears it from both the cache and the
/// BlockStore.
#[tokio::test]
async fn s4_delete_clears_block_store_and_existence() {
    let h = build_harness();
    let id = PayloadId::new("p4").unwrap();

    h.service.write_at(&id, b"some bytes", 0).await.unwrap();
    h.service.flush(&id).await.unwrap();
    assert!(h.service.exists(&id).await.unwrap());

    h.service.delete(&id).await.unwrap();

    assert!(!h.service.exists(&id).await.unwrap());
    let keys = h.block_store.list_by_prefix("p4/").await.unwrap();
    assert!(keys.is_empty());
}

/// S5: a copy-on-write read against a flushed source reproduces the
/// source's bytes, and flushing the COW destination writes its own copy
/// into the BlockStore that is independent of later writes to the source.
#[tokio::test]
async fn s5_copy_on_write_read_is_independent_of_later_source_writes() {
    let h = build_harness();
    let src = PayloadId::new("src").unwrap();
    let dst = PayloadId::new("dst").unwrap();

    h.service.write_at(&src, b"original content", 0).await.unwrap();
    h.service.flush(&src).await.unwrap();

    let mut buf = [0u8; 16];
    h.service.read_at_with_cow_source(&dst, &src, &mut buf, 0).await.unwrap();
    assert_eq!(&buf, b"original content");

    h.service.flush(&dst).await.unwrap();
    let dst_bytes = h.block_store.get(&block_key("dst", 0, 0)).await.unwrap();
    assert_eq!(&dst_bytes[..16], b"original content");

    h.service.write_at(&src, b"mutated!!!!!!!!!!", 0).await.unwrap();
    h.service.flush(&src).await.unwrap();

    let mut dst_buf = [0u8; 16];
    h.service.read_at(&dst, &mut dst_buf, 0).await.unwrap();
    assert_eq!(&dst_buf, b"original content");
}

/// S6: closing the Offloader drains in-flight uploads within the grace
/// period, and a healthcheck issued after close reports `Closed`.
#[tokio::test]
async fn s6_close_drains_in_flight_uploads_then_reports_closed() {
    let h = build_harness();
    let block_layout = BlockLayoutConfig::default();
    let block_size = block_layout.block_size.bytes() as u64;

    for i in 0..3u64 {
        let id = PayloadId::new(format!("inflight-{i}")).unwrap();
        let data = vec![i as u8; block_layout.block_size.bytes()];
        h.service.write_at(&id, &data, 0).await.unwrap();
        h.service.flush(&id).await.unwrap();
    }

    h.offloader.close(2_000).await.unwrap();

    for i in 0..3u64 {
        let key = block_key(&format!("inflight-{i}"), 0, 0);
        let bytes = h.block_store.get(&key).await.unwrap();
        assert_eq!(bytes.len(), block_size as usize);
    }

    let err = h.offloader.healthcheck().await.unwrap_err();
    assert!(matches!(err, PayloadError::Closed));
}
