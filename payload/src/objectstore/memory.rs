// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-memory `ObjectStore`, used for tests and the demo binary's
//! memory-backed profile.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::ObjectStore;
use dittofs_payload_domain::value_objects::BlockHash;

#[derive(Default)]
pub struct InMemoryObjectStore {
    refcounts: Mutex<HashMap<BlockHash, u64>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn lookup(&self, hash: &BlockHash) -> PayloadResult<(bool, u64)> {
        let table = self.refcounts.lock();
        match table.get(hash) {
            Some(&count) => Ok((true, count)),
            None => Ok((false, 0)),
        }
    }

    async fn incref(&self, hash: &BlockHash) -> PayloadResult<u64> {
        let mut table = self.refcounts.lock();
        match table.get_mut(hash) {
            Some(count) => {
                *count += 1;
                Ok(*count)
            }
            None => Err(PayloadError::internal(format!("incref on unknown hash {}", hex::encode(hash)))),
        }
    }

    async fn insert(&self, hash: &BlockHash) -> PayloadResult<()> {
        let mut table = self.refcounts.lock();
        *table.entry(*hash).or_insert(0) += 1;
        Ok(())
    }

    async fn decref(&self, hash: &BlockHash) -> PayloadResult<u64> {
        let mut table = self.refcounts.lock();
        match table.get_mut(hash) {
            Some(count) => {
                *count = count.saturating_sub(1);
                Ok(*count)
            }
            None => Err(PayloadError::internal(format!("decref on unknown hash {}", hex::encode(hash)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedup_refcount_reaches_two_for_shared_content() {
        let store = InMemoryObjectStore::new();
        let hash = [7u8; 32];
        store.insert(&hash).await.unwrap();
        store.incref(&hash).await.unwrap();
        assert_eq!(store.lookup(&hash).await.unwrap(), (true, 2));
    }
}
