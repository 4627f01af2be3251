// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-memory `BlockStore`, used for tests and the demo binary's
//! memory-backed profile.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::BlockStore;
use dittofs_payload_domain::value_objects::BlockKey;

/// A `BTreeMap` keeps `list_by_prefix` cheap (a range scan) without
/// requiring a real sorted-key store.
#[derive(Default)]
pub struct InMemoryBlockStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    async fn put(&self, key: &BlockKey, bytes: &[u8]) -> PayloadResult<()> {
        self.objects.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &BlockKey) -> PayloadResult<Vec<u8>> {
        self.objects
            .read()
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| PayloadError::block_not_found(key))
    }

    async fn list_by_prefix(&self, prefix: &str) -> PayloadResult<Vec<BlockKey>> {
        let objects = self.objects.read();
        objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| BlockKey::parse(k))
            .collect()
    }

    async fn delete(&self, key: &BlockKey) -> PayloadResult<()> {
        self.objects.write().remove(&key.to_string());
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> PayloadResult<()> {
        self.objects.write().retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    async fn healthcheck(&self) -> PayloadResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dittofs_payload_domain::value_objects::PayloadId;

    fn key(payload: &str, chunk: u32, block: u32) -> BlockKey {
        BlockKey::new(PayloadId::new(payload).unwrap(), chunk, block)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryBlockStore::new();
        let k = key("p1", 0, 0);
        store.put(&k, b"hello world").await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn get_missing_key_is_block_not_found() {
        let store = InMemoryBlockStore::new();
        let err = store.get(&key("p1", 0, 0)).await.unwrap_err();
        assert!(err.is_block_not_found());
    }

    #[tokio::test]
    async fn list_and_delete_by_prefix_are_scoped_to_payload() {
        let store = InMemoryBlockStore::new();
        store.put(&key("p1", 0, 0), b"a").await.unwrap();
        store.put(&key("p1", 0, 1), b"b").await.unwrap();
        store.put(&key("p2", 0, 0), b"c").await.unwrap();

        let listed = store.list_by_prefix("p1/").await.unwrap();
        assert_eq!(listed.len(), 2);

        store.delete_by_prefix("p1/").await.unwrap();
        assert!(store.list_by_prefix("p1/").await.unwrap().is_empty());
        assert_eq!(store.list_by_prefix("p2/").await.unwrap().len(), 1);
    }
}
