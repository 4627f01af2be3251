// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain service ports: the narrow trait boundaries between the pure
//! domain layer and infrastructure implementations.

pub mod block_store;
pub mod cache_service;
pub mod checksum_service;
pub mod object_store;
pub mod offloader_service;

pub use block_store::BlockStore;
pub use cache_service::{CacheReader, CacheStateManager, CacheWriter};

/// Bundles the three cache traits so infrastructure can hand the Offloader
/// one object instead of three, without forcing the traits themselves to
/// merge into a god-trait that every test double must implement in full.
pub trait Cache: CacheReader + CacheWriter + CacheStateManager {}
impl<T: CacheReader + CacheWriter + CacheStateManager> Cache for T {}
pub use checksum_service::{ChecksumService, Sha256ChecksumService};
pub use object_store::ObjectStore;
pub use offloader_service::{BlockDownloader, BlockUploader, FlushResult, RecoveryStats};

use crate::value_objects::{BlockRef, PayloadId};

/// Invoked once all blocks of a `PayloadID` generation are `Uploaded` with
/// no dirty remainder. Delivers the ordered block refs the metadata layer
/// hashes to compute final object identity.
///
/// Implementations must be idempotent: the Offloader guarantees at-most-once
/// delivery per generation, but a subsequent write starts a new generation
/// and will invoke the callback again.
pub trait FinalizationCallback: Send + Sync {
    fn on_finalized(&self, payload_id: &PayloadId, block_refs: Vec<BlockRef>);
}

impl<F> FinalizationCallback for F
where
    F: Fn(&PayloadId, Vec<BlockRef>) + Send + Sync,
{
    fn on_finalized(&self, payload_id: &PayloadId, block_refs: Vec<BlockRef>) {
        self(payload_id, block_refs)
    }
}
