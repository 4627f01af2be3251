// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Block content hashing.
//!
//! SHA-256 over the exact bytes of a block is the basis for both
//! integrity (invariant I1) and deduplication (the `ObjectStore` key).
//! This is CPU-bound, so the service stays synchronous, following the
//! teacher's rule that domain services are sync and async execution is an
//! infrastructure concern (see `payload::offloader`, which calls this from
//! `tokio::task::spawn_blocking`).

use sha2::{Digest, Sha256};

use crate::value_objects::BlockHash;

/// Computes the SHA-256 hash of a single block's bytes.
pub trait ChecksumService: Send + Sync {
    /// Hashes `data`, returning the raw 32-byte digest.
    fn hash_block(&self, data: &[u8]) -> BlockHash;
}

/// Default [`ChecksumService`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256ChecksumService;

impl ChecksumService for Sha256ChecksumService {
    fn hash_block(&self, data: &[u8]) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_hash_identically() {
        let svc = Sha256ChecksumService;
        let a = svc.hash_block(b"hello world");
        let b = svc.hash_block(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        let svc = Sha256ChecksumService;
        assert_ne!(svc.hash_block(b"a"), svc.hash_block(b"b"));
    }

    #[test]
    fn known_vector() {
        // SHA-256("") per FIPS 180-4 test vectors.
        let svc = Sha256ChecksumService;
        let digest = svc.hash_block(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
