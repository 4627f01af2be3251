// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The mmap-backed `Cache`: `CacheReader` + `CacheWriter` + `CacheStateManager`
//! over one in-process write buffer, optionally durable across restarts.
//!
//! Layout of the backing file, when configured, is a fixed-size header
//! region followed by a data region:
//!
//! ```text
//! [ slot 0 header | slot 1 header | ... ] [ slot 0 data | slot 1 data | ... ]
//! ```
//!
//! Each header record is [`SLOT_HEADER_LEN`] bytes and fully describes the
//! block occupying that slot (payload id, chunk/block index, valid length,
//! hash) so a process restart can reconstruct the in-memory index by
//! scanning the header region once, without touching the data region.
//! `Uploading` is never persisted: a block found `Uploading` at the moment
//! of a crash is indistinguishable from `Dirty` to a resuming process (the
//! upload was never acknowledged), so the cache only tracks `Empty`,
//! `Dirty`, and `Uploaded` itself and lets the Offloader re-discover
//! in-flight work via `get_dirty_blocks`.

use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::path::Path;

use async_trait::async_trait;
use memmap2::MmapMut;
use parking_lot::Mutex;

use dittofs_payload_domain::config::CacheConfig;
use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::{CacheReader, CacheStateManager, CacheWriter};
use dittofs_payload_domain::value_objects::{BlockHash, BlockState, PayloadId, PendingBlock};

use crate::cache::cache_entry::{BlockSlot, ChunkEntry, PayloadEntry};

const SLOT_HEADER_LEN: usize = 128;
const MAX_PAYLOAD_ID_LEN: usize = 64;

struct SlotHeader {
    occupied: bool,
    state: BlockState,
    payload_id: String,
    chunk_index: u32,
    block_index: u32,
    valid_len: u32,
    hash: Option<BlockHash>,
}

impl SlotHeader {
    fn encode(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= SLOT_HEADER_LEN);
        out.fill(0);
        out[0] = self.occupied as u8;
        out[1] = match self.state {
            BlockState::Empty => 0,
            BlockState::Dirty => 1,
            BlockState::Uploading => 1, // collapsed to Dirty on persist, see module docs
            BlockState::Uploaded => 2,
        };
        let id_bytes = self.payload_id.as_bytes();
        let id_len = id_bytes.len().min(MAX_PAYLOAD_ID_LEN);
        out[2] = id_len as u8;
        out[3..3 + id_len].copy_from_slice(&id_bytes[..id_len]);
        let mut off = 3 + MAX_PAYLOAD_ID_LEN;
        out[off..off + 4].copy_from_slice(&self.chunk_index.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.block_index.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.valid_len.to_le_bytes());
        off += 4;
        if let Some(hash) = self.hash {
            out[off] = 1;
            out[off + 1..off + 33].copy_from_slice(&hash);
        }
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        if buf[0] == 0 {
            return None;
        }
        let state = match buf[1] {
            1 => BlockState::Dirty,
            2 => BlockState::Uploaded,
            _ => BlockState::Empty,
        };
        let id_len = buf[2] as usize;
        let payload_id = String::from_utf8_lossy(&buf[3..3 + id_len.min(MAX_PAYLOAD_ID_LEN)]).to_string();
        let mut off = 3 + MAX_PAYLOAD_ID_LEN;
        let chunk_index = u32::from_le_bytes(buf[off..off + 4].try_into().ok()?);
        off += 4;
        let block_index = u32::from_le_bytes(buf[off..off + 4].try_into().ok()?);
        off += 4;
        let valid_len = u32::from_le_bytes(buf[off..off + 4].try_into().ok()?);
        off += 4;
        let hash = if buf[off] == 1 {
            let mut h = [0u8; 32];
            h.copy_from_slice(&buf[off + 1..off + 33]);
            Some(h)
        } else {
            None
        };
        Some(Self { occupied: true, state, payload_id, chunk_index, block_index, valid_len, hash })
    }
}

/// All mutable cache state behind a single lock, including the mmap handle
/// so header and data writes never race the index.
struct State {
    entries: HashMap<PayloadId, PayloadEntry>,
    dirty_bytes: u64,
    capacity_bytes: u64,
    num_slots: usize,
    free_slots: Vec<usize>,
    next_slot: usize,
    /// Most-recently-touched blocks last; used to pick an eviction victim
    /// when slot allocation is exhausted. May contain stale entries for
    /// blocks that no longer exist; these are skipped lazily.
    recency: VecDeque<(PayloadId, u32, u32)>,
    mmap: Option<MmapMut>,
}

impl State {
    fn data_region_offset(&self) -> usize {
        self.num_slots * SLOT_HEADER_LEN
    }

    fn write_header(&mut self, slot: usize, header: &SlotHeader) {
        if let Some(mmap) = self.mmap.as_mut() {
            let start = slot * SLOT_HEADER_LEN;
            header.encode(&mut mmap[start..start + SLOT_HEADER_LEN]);
        }
    }

    fn clear_header(&mut self, slot: usize) {
        if let Some(mmap) = self.mmap.as_mut() {
            let start = slot * SLOT_HEADER_LEN;
            mmap[start..start + SLOT_HEADER_LEN].fill(0);
        }
    }

    fn write_data(&mut self, slot: usize, block_size: usize, data: &[u8]) {
        if let Some(mmap) = self.mmap.as_mut() {
            let data_off = self.num_slots * SLOT_HEADER_LEN + slot * block_size;
            mmap[data_off..data_off + data.len()].copy_from_slice(data);
        }
    }

    fn touch(&mut self, payload_id: &PayloadId, chunk_index: u32, block_index: u32) {
        self.recency.push_back((payload_id.clone(), chunk_index, block_index));
        if self.recency.len() > 4096 {
            self.recency.pop_front();
        }
    }

    /// Allocates a slot for a new block, evicting an `Uploaded` block via
    /// simple recency order if the slot pool is exhausted.
    fn alloc_slot(&mut self) -> Option<usize> {
        if let Some(slot) = self.free_slots.pop() {
            return Some(slot);
        }
        if self.next_slot < self.num_slots {
            let slot = self.next_slot;
            self.next_slot += 1;
            return Some(slot);
        }
        while let Some((payload_id, chunk_index, block_index)) = self.recency.pop_front() {
            let Some(entry) = self.entries.get_mut(&payload_id) else { continue };
            let Some(chunk) = entry.chunks.get_mut(&chunk_index) else { continue };
            let Some(block) = chunk.blocks.get(&block_index) else { continue };
            if block.state != BlockState::Uploaded {
                continue;
            }
            let freed_slot = block.mmap_slot;
            chunk.blocks.remove(&block_index);
            if let Some(slot) = freed_slot {
                self.clear_header(slot);
                return Some(slot);
            }
        }
        None
    }
}

/// In-process cache implementing `CacheReader`, `CacheWriter`, and
/// `CacheStateManager`, optionally durable via an mmap-backed file.
pub struct MmapCache {
    state: Mutex<State>,
    block_size: usize,
    chunk_size: u64,
}

impl MmapCache {
    /// Builds a cache from `config`. When `config.backing_file` is set, the
    /// file is created (if missing) and mmap'd, and any slots left
    /// `Dirty` or `Uploaded` by a prior process are loaded back into the
    /// in-memory index (crash recovery for the cache's own write buffer,
    /// distinct from the Offloader's block-store-level recovery).
    pub fn open(config: &CacheConfig, block_size: usize, chunk_size: u64) -> PayloadResult<Self> {
        let num_slots = (config.capacity_bytes as usize / block_size).max(1);
        let mut state = State {
            entries: HashMap::new(),
            dirty_bytes: 0,
            capacity_bytes: config.capacity_bytes,
            num_slots,
            free_slots: Vec::new(),
            next_slot: 0,
            recency: VecDeque::new(),
            mmap: None,
        };

        if let Some(path) = &config.backing_file {
            let mmap = Self::open_backing_file(path, num_slots, block_size)?;
            state.mmap = Some(mmap);
            Self::recover_from_mmap(&mut state, block_size, chunk_size)?;
        }

        Ok(Self { state: Mutex::new(state), block_size, chunk_size })
    }

    fn open_backing_file(path: &Path, num_slots: usize, block_size: usize) -> PayloadResult<MmapMut> {
        let total_len = num_slots * SLOT_HEADER_LEN + num_slots * block_size;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| PayloadError::internal(format!("failed to open cache backing file {}: {e}", path.display())))?;
        file.set_len(total_len as u64)
            .map_err(|e| PayloadError::internal(format!("failed to size cache backing file {}: {e}", path.display())))?;
        // SAFETY: `file` is exclusively owned by this cache for its lifetime;
        // no other process is expected to map the same backing file
        // concurrently.
        unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| PayloadError::internal(format!("failed to mmap cache backing file {}: {e}", path.display())))
    }

    fn recover_from_mmap(state: &mut State, block_size: usize, chunk_size: u64) -> PayloadResult<()> {
        let num_slots = state.num_slots;
        let Some(mmap) = state.mmap.as_ref() else { return Ok(()) };
        let data_region_offset = num_slots * SLOT_HEADER_LEN;

        let mut recovered = Vec::new();
        for slot in 0..num_slots {
            let start = slot * SLOT_HEADER_LEN;
            let Some(header) = SlotHeader::decode(&mmap[start..start + SLOT_HEADER_LEN]) else { continue };
            let payload_id = match PayloadId::new(&header.payload_id) {
                Ok(id) => id,
                Err(_) => continue,
            };
            let data_off = data_region_offset + slot * block_size;
            let data = mmap[data_off..data_off + block_size].to_vec();
            recovered.push((slot, header, payload_id, data));
        }

        for (slot, header, payload_id, data) in recovered {
            let entry = state.entries.entry(payload_id.clone()).or_default();
            let chunk = entry.chunks.entry(header.chunk_index).or_default();
            let dirty_range = 0..header.valid_len as usize;
            let slot_state = header.state;
            chunk.blocks.insert(
                header.block_index,
                BlockSlot {
                    state: slot_state,
                    data,
                    dirty_range,
                    hash: header.hash,
                    generation: 1,
                    mmap_slot: Some(slot),
                },
            );
            entry.touch_size(header.chunk_index as u64 * chunk_size + header.block_index as u64 * block_size as u64 + header.valid_len as u64);
            if slot_state != BlockState::Uploaded {
                state.dirty_bytes += block_size as u64;
            }
            state.next_slot = state.next_slot.max(slot + 1);
        }
        Ok(())
    }

    fn for_each_block_span<F>(offset_in_chunk: u64, len: usize, block_size: usize, mut f: F)
    where
        F: FnMut(u32, usize, usize, usize),
    {
        let mut cur = offset_in_chunk;
        let mut buf_off = 0usize;
        let mut remaining = len;
        while remaining > 0 {
            let block_idx = (cur / block_size as u64) as u32;
            let offset_in_block = (cur % block_size as u64) as usize;
            let take = remaining.min(block_size - offset_in_block);
            f(block_idx, offset_in_block, buf_off, take);
            cur += take as u64;
            buf_off += take;
            remaining -= take;
        }
    }
}

#[async_trait]
impl CacheReader for MmapCache {
    async fn read_at(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        dest: &mut [u8],
    ) -> PayloadResult<bool> {
        let block_size = self.block_size;
        let mut state = self.state.lock();
        let mut any_found = false;

        let block_touches: Vec<(u32, usize, usize, usize)> = {
            let mut v = Vec::new();
            Self::for_each_block_span(offset_in_chunk, dest.len(), block_size, |b, off, buf_off, take| {
                v.push((b, off, buf_off, take));
            });
            v
        };

        for (block_idx, offset_in_block, buf_off, take) in block_touches {
            let found = state
                .entries
                .get(payload_id)
                .and_then(|e| e.chunks.get(&chunk_index))
                .and_then(|c| c.blocks.get(&block_idx));
            match found {
                Some(block) => {
                    any_found = true;
                    dest[buf_off..buf_off + take].copy_from_slice(&block.data[offset_in_block..offset_in_block + take]);
                }
                None => {
                    dest[buf_off..buf_off + take].fill(0);
                }
            }
            state.touch(payload_id, chunk_index, block_idx);
        }
        Ok(any_found)
    }

    async fn get_file_size(&self, payload_id: &PayloadId) -> PayloadResult<(u64, bool)> {
        let state = self.state.lock();
        match state.entries.get(payload_id) {
            Some(entry) => Ok((entry.size, true)),
            None => Ok((0, false)),
        }
    }

    async fn list_files(&self) -> PayloadResult<Vec<PayloadId>> {
        let state = self.state.lock();
        Ok(state.entries.keys().cloned().collect())
    }
}

#[async_trait]
impl CacheWriter for MmapCache {
    async fn write_at(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        offset_in_chunk: u64,
        data: &[u8],
    ) -> PayloadResult<()> {
        let block_size = self.block_size;
        let mut state = self.state.lock();

        let touches: Vec<(u32, usize, usize, usize)> = {
            let mut v = Vec::new();
            Self::for_each_block_span(offset_in_chunk, data.len(), block_size, |b, off, buf_off, take| {
                v.push((b, off, buf_off, take));
            });
            v
        };

        for (block_idx, offset_in_block, buf_off, take) in touches {
            let (is_new_block, was_uploaded) = {
                let chunk = state.entries.entry(payload_id.clone()).or_default().chunks.entry(chunk_index).or_insert_with(ChunkEntry::default);
                let is_new_block = !chunk.blocks.contains_key(&block_idx);
                let was_uploaded = chunk.blocks.get(&block_idx).map(|b| b.state == BlockState::Uploaded).unwrap_or(false);
                (is_new_block, was_uploaded)
            };

            let newly_dirty = is_new_block || was_uploaded;
            if newly_dirty && state.dirty_bytes + block_size as u64 > state.capacity_bytes {
                return Err(PayloadError::CacheFull);
            }

            let slot_to_alloc = if is_new_block { state.alloc_slot() } else { None };
            if newly_dirty {
                state.dirty_bytes += block_size as u64;
            }

            let candidate_size = chunk_index as u64 * self.chunk_size + offset_in_chunk + buf_off as u64 + take as u64;

            let (block_data, valid_len, mmap_slot) = {
                let entry = state.entries.get_mut(payload_id).expect("just inserted");
                let chunk = entry.chunks.get_mut(&chunk_index).expect("just inserted");
                let block = chunk.blocks.entry(block_idx).or_insert_with(|| BlockSlot::new_empty(block_size));
                if is_new_block {
                    block.mmap_slot = slot_to_alloc;
                }
                block.data[offset_in_block..offset_in_block + take].copy_from_slice(&data[buf_off..buf_off + take]);
                block.union_dirty_range(offset_in_block..offset_in_block + take);
                block.state = BlockState::Dirty;
                block.generation += 1;
                let result = (block.data.clone(), block.dirty_range.end as u32, block.mmap_slot);
                entry.touch_size(candidate_size);
                result
            };

            if let Some(slot) = mmap_slot {
                state.write_data(slot, block_size, &block_data);
                state.write_header(
                    slot,
                    &SlotHeader {
                        occupied: true,
                        state: BlockState::Dirty,
                        payload_id: payload_id.as_str().to_string(),
                        chunk_index,
                        block_index: block_idx,
                        valid_len,
                        hash: None,
                    },
                );
            }

            state.touch(payload_id, chunk_index, block_idx);
        }
        Ok(())
    }

    async fn truncate(&self, payload_id: &PayloadId, new_size: u64) -> PayloadResult<()> {
        let block_size = self.block_size as u64;
        let chunk_size = self.chunk_size;
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(payload_id) else { return Ok(()) };
        entry.size = new_size;

        // Whole-block truncation only: a block whose start byte is at or
        // beyond `new_size` is dropped entirely; a block straddling
        // `new_size` is kept unclipped (see design ledger's
        // partial-block-truncation open question).
        let mut freed = Vec::new();
        entry.chunks.retain(|&chunk_index, chunk| {
            let chunk_start = chunk_index as u64 * chunk_size;
            if chunk_start >= new_size {
                for block in chunk.blocks.values() {
                    if let Some(slot) = block.mmap_slot {
                        freed.push((slot, block.state));
                    }
                }
                return false;
            }
            chunk.blocks.retain(|&block_index, block| {
                let block_start = chunk_start + block_index as u64 * block_size;
                let drop = block_start >= new_size;
                if drop {
                    if let Some(slot) = block.mmap_slot {
                        freed.push((slot, block.state));
                    }
                }
                !drop
            });
            !chunk.blocks.is_empty()
        });

        for (slot, slot_state) in freed {
            if slot_state != BlockState::Uploaded {
                state.dirty_bytes = state.dirty_bytes.saturating_sub(block_size);
            }
            state.clear_header(slot);
            state.free_slots.push(slot);
        }
        Ok(())
    }

    async fn remove(&self, payload_id: &PayloadId) -> PayloadResult<()> {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.remove(payload_id) {
            let mut slots = Vec::new();
            for chunk in entry.chunks.values() {
                for block in chunk.blocks.values() {
                    if let Some(slot) = block.mmap_slot {
                        slots.push((slot, block.state));
                    }
                }
            }
            for (slot, slot_state) in slots {
                if slot_state != BlockState::Uploaded {
                    state.dirty_bytes = state.dirty_bytes.saturating_sub(self.block_size as u64);
                }
                state.clear_header(slot);
                state.free_slots.push(slot);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStateManager for MmapCache {
    async fn get_dirty_blocks(&self, payload_id: &PayloadId) -> PayloadResult<Vec<PendingBlock>> {
        let state = self.state.lock();
        let Some(entry) = state.entries.get(payload_id) else { return Ok(Vec::new()) };
        let mut pending = Vec::new();
        for (&chunk_index, chunk) in entry.chunks.iter() {
            for (&block_index, block) in chunk.blocks.iter() {
                if block.state == BlockState::Dirty {
                    pending.push(PendingBlock::new(
                        chunk_index,
                        block_index,
                        block.data.clone(),
                        block.dirty_range.clone(),
                        block.generation,
                    ));
                }
            }
        }
        Ok(pending)
    }

    async fn mark_block_uploaded(
        &self,
        payload_id: &PayloadId,
        chunk_index: u32,
        block_index: u32,
        hash: BlockHash,
        expected_generation: u64,
    ) -> PayloadResult<bool> {
        let mut state = self.state.lock();
        let block_size = self.block_size;
        let Some(entry) = state.entries.get_mut(payload_id) else { return Ok(false) };
        let Some(chunk) = entry.chunks.get_mut(&chunk_index) else { return Ok(false) };
        let Some(block) = chunk.blocks.get_mut(&block_index) else { return Ok(false) };

        if block.generation != expected_generation {
            // Re-dirtied since the snapshot was taken; discard this upload's
            // effect and leave the block Dirty for re-upload.
            return Ok(false);
        }

        block.state = BlockState::Uploaded;
        block.hash = Some(hash);
        let valid_len = block.dirty_range.end as u32;
        let mmap_slot = block.mmap_slot;

        if let Some(slot) = mmap_slot {
            state.write_header(
                slot,
                &SlotHeader {
                    occupied: true,
                    state: BlockState::Uploaded,
                    payload_id: payload_id.as_str().to_string(),
                    chunk_index,
                    block_index,
                    valid_len,
                    hash: Some(hash),
                },
            );
        }
        state.dirty_bytes = state.dirty_bytes.saturating_sub(block_size as u64);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BLOCK: usize = 4096;
    const CHUNK: u64 = 4 * BLOCK as u64;

    fn config(capacity_bytes: u64, backing_file: Option<std::path::PathBuf>) -> CacheConfig {
        CacheConfig { capacity_bytes, backing_file }
    }

    fn pid(s: &str) -> PayloadId {
        PayloadId::new(s).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 10, b"hello").await.unwrap();

        let mut dest = vec![0u8; 5];
        let found = cache.read_at(&id, 0, 10, &mut dest).await.unwrap();
        assert!(found);
        assert_eq!(&dest, b"hello");
    }

    #[tokio::test]
    async fn read_miss_returns_false_and_zero_fills() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        let mut dest = vec![0xAAu8; 8];
        let found = cache.read_at(&id, 0, 0, &mut dest).await.unwrap();
        assert!(!found);
        assert_eq!(dest, vec![0u8; 8]);
    }

    #[tokio::test]
    async fn write_across_block_boundary_touches_both_blocks() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        let data = vec![7u8; 16];
        let offset = BLOCK as u64 - 8;
        cache.write_at(&id, 0, offset, &data).await.unwrap();

        let mut dest = vec![0u8; 16];
        assert!(cache.read_at(&id, 0, offset, &mut dest).await.unwrap());
        assert_eq!(dest, data);
    }

    #[tokio::test]
    async fn backpressure_rejects_writes_past_capacity() {
        let cache = MmapCache::open(&config(BLOCK as u64, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 0, b"a").await.unwrap();
        let err = cache.write_at(&id, 1, 0, b"b").await.unwrap_err();
        assert!(matches!(err, PayloadError::CacheFull));
    }

    #[tokio::test]
    async fn mark_block_uploaded_noops_on_stale_generation() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 0, b"v1").await.unwrap();

        let pending = cache.get_dirty_blocks(&id).await.unwrap();
        assert_eq!(pending.len(), 1);
        let stale_generation = pending[0].generation;

        // redirty after the snapshot was taken
        cache.write_at(&id, 0, 0, b"v2").await.unwrap();

        let applied = cache.mark_block_uploaded(&id, 0, 0, [1u8; 32], stale_generation).await.unwrap();
        assert!(!applied);

        let still_pending = cache.get_dirty_blocks(&id).await.unwrap();
        assert_eq!(still_pending.len(), 1, "block must remain dirty after a discarded stale upload");
    }

    #[tokio::test]
    async fn mark_block_uploaded_applies_on_matching_generation() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 0, b"v1").await.unwrap();
        let pending = cache.get_dirty_blocks(&id).await.unwrap();

        let applied = cache.mark_block_uploaded(&id, 0, 0, [2u8; 32], pending[0].generation).await.unwrap();
        assert!(applied);
        assert!(cache.get_dirty_blocks(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncate_drops_whole_blocks_beyond_new_size() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 0, b"a").await.unwrap();
        cache.write_at(&id, 0, BLOCK as u64, b"b").await.unwrap();

        cache.truncate(&id, BLOCK as u64).await.unwrap();
        let (size, found) = cache.get_file_size(&id).await.unwrap();
        assert!(found);
        assert_eq!(size, BLOCK as u64);

        let mut dest = vec![0u8; 1];
        assert!(!cache.read_at(&id, 0, BLOCK as u64, &mut dest).await.unwrap());
    }

    #[tokio::test]
    async fn remove_clears_all_state() {
        let cache = MmapCache::open(&config(BLOCK as u64 * 4, None), BLOCK, CHUNK).unwrap();
        let id = pid("f1");
        cache.write_at(&id, 0, 0, b"a").await.unwrap();
        cache.remove(&id).await.unwrap();
        let (_, found) = cache.get_file_size(&id).await.unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn durable_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        let backing = dir.path().join("cache.bin");
        let id = pid("f1");

        {
            let cache = MmapCache::open(&config(BLOCK as u64 * 4, Some(backing.clone())), BLOCK, CHUNK).unwrap();
            cache.write_at(&id, 0, 0, b"durable").await.unwrap();
        }

        let reopened = MmapCache::open(&config(BLOCK as u64 * 4, Some(backing)), BLOCK, CHUNK).unwrap();
        let pending = reopened.get_dirty_blocks(&id).await.unwrap();
        assert_eq!(pending.len(), 1, "a dirty block at crash time must reappear as dirty after recovery");

        let mut dest = vec![0u8; 7];
        assert!(reopened.read_at(&id, 0, 0, &mut dest).await.unwrap());
        assert_eq!(&dest, b"durable");
    }
}
