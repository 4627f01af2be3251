// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Filesystem-backed `BlockStore`.
//!
//! Each `BlockKey` maps to a file under `root`, mirroring the key's
//! `chunk-{n}/block-{m}` structure as a subdirectory layout so
//! `list_by_prefix` can walk a bounded subtree instead of the whole root.
//! `put` writes to a sibling temp file and renames into place, so a
//! concurrent `get` never observes a partial write (the §4.2 atomicity
//! contract).

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::BlockStore;
use dittofs_payload_domain::value_objects::BlockKey;

pub struct FilesystemBlockStore {
    root: PathBuf,
}

impl FilesystemBlockStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &BlockKey) -> PathBuf {
        self.root
            .join(key.payload_id().as_str())
            .join(format!("chunk-{}", key.chunk_index()))
            .join(format!("block-{}", key.block_index()))
    }

    fn payload_dir(&self, payload_dir_name: &str) -> PathBuf {
        self.root.join(payload_dir_name)
    }
}

#[async_trait]
impl BlockStore for FilesystemBlockStore {
    async fn put(&self, key: &BlockKey, bytes: &[u8]) -> PayloadResult<()> {
        let final_path = self.path_for(key);
        let dir = final_path.parent().expect("path_for always has a parent");
        fs::create_dir_all(dir).await?;

        let tmp_path = dir.join(format!(".tmp-{}", key.block_index()));
        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    async fn get(&self, key: &BlockKey) -> PayloadResult<Vec<u8>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PayloadError::block_not_found(key)),
            Err(e) => Err(PayloadError::from(e)),
        }
    }

    async fn list_by_prefix(&self, prefix: &str) -> PayloadResult<Vec<BlockKey>> {
        // Every key under this store takes the form
        // "{payloadId}/chunk-{n}/block-{m}"; prefixes in practice are
        // either "{payloadId}/" (whole-payload) or
        // "{payloadId}/chunk-{n}/" (single-chunk). Walk the matching
        // payload directory and filter by the literal prefix so both
        // shapes work without special-casing.
        let payload_dir_name = prefix.split('/').next().unwrap_or_default();
        let dir = self.payload_dir(payload_dir_name);

        let mut keys = Vec::new();
        let mut chunk_entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PayloadError::from(e)),
        };

        while let Some(chunk_entry) = chunk_entries.next_entry().await? {
            if !chunk_entry.file_type().await?.is_dir() {
                continue;
            }
            let mut block_entries = fs::read_dir(chunk_entry.path()).await?;
            while let Some(block_entry) = block_entries.next_entry().await? {
                let file_name = block_entry.file_name();
                let file_name = file_name.to_string_lossy();
                if !file_name.starts_with("block-") {
                    continue;
                }
                let chunk_name = chunk_entry.file_name();
                let candidate = format!("{payload_dir_name}/{}/{file_name}", chunk_name.to_string_lossy());
                if candidate.starts_with(prefix) {
                    keys.push(BlockKey::parse(&candidate)?);
                }
            }
        }
        Ok(keys)
    }

    async fn delete(&self, key: &BlockKey) -> PayloadResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PayloadError::from(e)),
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) -> PayloadResult<()> {
        let payload_dir_name = prefix.split('/').next().unwrap_or_default();
        let dir = self.payload_dir(payload_dir_name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PayloadError::from(e)),
        }
    }

    async fn healthcheck(&self) -> PayloadResult<()> {
        if fs::metadata(&self.root).await.is_err() {
            fs::create_dir_all(&self.root).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dittofs_payload_domain::value_objects::PayloadId;
    use tempfile::tempdir;

    fn key(payload: &str, chunk: u32, block: u32) -> BlockKey {
        BlockKey::new(PayloadId::new(payload).unwrap(), chunk, block)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = FilesystemBlockStore::new(dir.path());
        let k = key("p1", 0, 0);
        store.put(&k, b"hello world").await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn get_missing_is_block_not_found() {
        let dir = tempdir().unwrap();
        let store = FilesystemBlockStore::new(dir.path());
        let err = store.get(&key("p1", 0, 0)).await.unwrap_err();
        assert!(err.is_block_not_found());
    }

    #[tokio::test]
    async fn list_and_delete_by_prefix() {
        let dir = tempdir().unwrap();
        let store = FilesystemBlockStore::new(dir.path());
        store.put(&key("p1", 0, 0), b"a").await.unwrap();
        store.put(&key("p1", 0, 1), b"b").await.unwrap();
        store.put(&key("p1", 1, 0), b"c").await.unwrap();

        let all = store.list_by_prefix("p1/").await.unwrap();
        assert_eq!(all.len(), 3);

        let chunk0_only = store.list_by_prefix("p1/chunk-0/").await.unwrap();
        assert_eq!(chunk0_only.len(), 2);

        store.delete_by_prefix("p1/").await.unwrap();
        assert!(store.list_by_prefix("p1/").await.unwrap().is_empty());
    }
}
