// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects for the payload data plane: identifiers, sizes, and keys.

pub mod block_key;
pub mod block_ref;
pub mod block_size;
pub mod block_state;
pub mod chunk_size;
pub mod payload_id;

pub use block_key::BlockKey;
pub use block_ref::{sorted_block_refs, BlockHash, BlockRef};
pub use block_size::BlockSize;
pub use block_state::{BlockState, PendingBlock};
pub use chunk_size::ChunkSize;
pub use payload_id::PayloadId;
