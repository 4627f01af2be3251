// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `ObjectStore`: the deduplication catalog, keyed by SHA-256 content hash.
//!
//! Consulted before every block PUT so identical content across (or within)
//! files is stored exactly once. Refcounts must be persisted alongside the
//! catalog so `decref` survives a restart.

use async_trait::async_trait;

use crate::error::PayloadResult;
use crate::value_objects::BlockHash;

/// Content-addressed dedup catalog: hash → refcount.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Looks up `hash`, returning `(exists, refcount)`. `refcount` is 0 when
    /// `exists` is false.
    async fn lookup(&self, hash: &BlockHash) -> PayloadResult<(bool, u64)>;

    /// Increments the refcount for an existing hash, returning the new
    /// value.
    async fn incref(&self, hash: &BlockHash) -> PayloadResult<u64>;

    /// Inserts a newly-uploaded hash with refcount 1. The caller has
    /// already verified the hash was not present via `lookup`; a
    /// conforming implementation must still be safe under a race with a
    /// concurrent `insert` of the same hash (e.g. upsert-incref), since
    /// two files may complete a lookup-miss for identical content at the
    /// same time.
    async fn insert(&self, hash: &BlockHash) -> PayloadResult<()>;

    /// Decrements the refcount for `hash`, returning the new value. A
    /// refcount that reaches zero may be garbage-collected by the caller
    /// (via a separate sweep); this trait does not mandate eager deletion.
    async fn decref(&self, hash: &BlockHash) -> PayloadResult<u64>;
}
