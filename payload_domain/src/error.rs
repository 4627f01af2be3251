// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Error types for the payload data plane.
//!
//! `PayloadError` is the single error type returned by every fallible public
//! API in the domain and infrastructure crates. Variants map one-to-one onto
//! the error kinds of the component design: cache backpressure, sparse
//! downloads, post-shutdown calls, cancellation, transient backend failures,
//! and configuration-time validation.

use std::fmt;

/// The error type returned by payload data plane operations.
#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
    /// The cache's dirty-byte budget is exhausted; the caller should retry
    /// after backoff (see the retry policy around `Cache::write_at`).
    #[error("cache is full (dirty bytes at or above configured capacity)")]
    CacheFull,

    /// No block exists at the requested key. Sparse-legitimate during
    /// downloads; callers that surface this to a reader should return
    /// zero bytes rather than propagate the error.
    #[error("block not found: {0}")]
    BlockNotFound(String),

    /// The component has been closed and will not accept new operations.
    #[error("operation attempted after close()")]
    Closed,

    /// The caller-scoped context was cancelled before the operation
    /// completed.
    #[error("operation cancelled")]
    ContextCancelled,

    /// A backend I/O failure that is expected to be retryable (object
    /// store outage, network blip). Uploads record these against the
    /// per-file error list rather than failing the triggering write.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// A configuration value failed validation. Fatal at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wraps `std::io::Error` from filesystem-backed components (mmap
    /// cache, filesystem `BlockStore`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A block's bytes failed integrity verification against its
    /// recorded hash.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// An unexpected internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),

    /// A `BlockKey` string did not parse as `"{payloadId}/chunk-{n}/block-{m}"`.
    #[error("invalid block key: {0}")]
    InvalidBlockKey(String),

    /// A configuration value was structurally valid but violates a
    /// documented invariant (e.g. chunk size not a power-of-two multiple
    /// of block size).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested `PayloadID` has no entry of any kind (the caller
    /// asked "does this payload exist" and it does not).
    #[error("payload not found: {0}")]
    PayloadNotFound(String),
}

impl PayloadError {
    /// Constructs an [`PayloadError::Internal`] from anything displayable.
    pub fn internal(msg: impl fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Constructs a [`PayloadError::Transient`] from anything displayable.
    pub fn transient(msg: impl fmt::Display) -> Self {
        Self::Transient(msg.to_string())
    }

    /// Constructs a [`PayloadError::Config`] from anything displayable.
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Constructs a [`PayloadError::Integrity`] from anything displayable.
    pub fn integrity(msg: impl fmt::Display) -> Self {
        Self::Integrity(msg.to_string())
    }

    /// Constructs a [`PayloadError::BlockNotFound`] for the given key.
    pub fn block_not_found(key: impl fmt::Display) -> Self {
        Self::BlockNotFound(key.to_string())
    }

    /// True if this error represents the sparse-legitimate "block not
    /// found" condition that callers should treat as zero bytes rather
    /// than an error.
    pub fn is_block_not_found(&self) -> bool {
        matches!(self, Self::BlockNotFound(_))
    }

    /// True if this error is transient and safe to retry on the next
    /// flush or background attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Io(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type PayloadResult<T> = Result<T, PayloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_not_found_is_sparse_legitimate() {
        let err = PayloadError::block_not_found("p1/chunk-0/block-0");
        assert!(err.is_block_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(PayloadError::transient("s3 timeout").is_transient());
        assert!(PayloadError::Io(std::io::Error::other("disk")).is_transient());
        assert!(!PayloadError::Closed.is_transient());
    }

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(PayloadError::CacheFull.to_string(), "cache is full (dirty bytes at or above configured capacity)");
        assert_eq!(PayloadError::Closed.to_string(), "operation attempted after close()");
    }
}
