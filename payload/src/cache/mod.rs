// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Write-buffer cache: `CacheReader` + `CacheWriter` + `CacheStateManager`
//! over block-sized slabs, durable via `memmap2` when configured with a
//! backing file.

mod cache_entry;
mod mmap_cache;

pub use mmap_cache::MmapCache;
