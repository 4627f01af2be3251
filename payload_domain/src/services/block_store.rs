// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `BlockStore`: the minimal key-value interface any durable backend
//! implements (in-memory, filesystem, S3).
//!
//! This is an infrastructure port: it is I/O-bound, so it is `async-trait`
//! even though it lives in the domain crate, following the teacher's
//! convention of keeping narrow port traits in the domain layer while their
//! implementations live in infrastructure.

use async_trait::async_trait;

use crate::error::PayloadResult;
use crate::value_objects::BlockKey;

/// Durable object storage keyed by opaque `BlockKey` strings.
///
/// Implementations must preserve the `BlockKey` wire format verbatim and
/// must make `put` atomic from a reader's perspective: partial objects must
/// never be visible to a concurrent `get`.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Writes `bytes` under `key`. Atomic: readers never observe a partial
    /// write.
    async fn put(&self, key: &BlockKey, bytes: &[u8]) -> PayloadResult<()>;

    /// Reads the bytes stored under `key`.
    ///
    /// Returns [`crate::error::PayloadError::BlockNotFound`] if no object
    /// exists at `key` — this is sparse-legitimate, not a failure.
    async fn get(&self, key: &BlockKey) -> PayloadResult<Vec<u8>>;

    /// Lists every key starting with `prefix`. Ordering is not guaranteed.
    async fn list_by_prefix(&self, prefix: &str) -> PayloadResult<Vec<BlockKey>>;

    /// Deletes the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &BlockKey) -> PayloadResult<()>;

    /// Deletes every object whose key starts with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> PayloadResult<()>;

    /// Verifies the backend is reachable and accepting requests.
    async fn healthcheck(&self) -> PayloadResult<()>;
}
