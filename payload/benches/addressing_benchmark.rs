// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Addressing benchmarks
//!
//! Benchmarks the pure offset-to-block mapping in `payload_domain::addressing`:
//!
//! - `benchmark_block_ranges`: cost of splitting a `(offset, length)` request
//!   into `BlockRange`s across request sizes from a partial block up to a
//!   multi-chunk span, at the default 4 MiB block / 64 MiB chunk layout.
//! - `benchmark_chunk_boundary_crossing`: a request of fixed length whose
//!   start offset is swept across a chunk boundary, isolating the extra
//!   iteration cost of a boundary-crossing split versus a single-chunk one.
//! - `benchmark_small_block_layout`: the same sweep at a much smaller block
//!   size (4 KiB), the shape a metadata-heavy workload would see, to check
//!   that per-range cost doesn't scale with block count.
//!
//! `BlockRangeIter` never allocates, so these benchmarks measure pure CPU
//! cost of the splitting arithmetic rather than allocator behavior.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dittofs_payload_domain::addressing::block_ranges;
use dittofs_payload_domain::value_objects::{BlockSize, ChunkSize};

fn default_layout() -> (BlockSize, ChunkSize) {
    (BlockSize::default(), ChunkSize::default())
}

fn benchmark_block_ranges(c: &mut Criterion) {
    let (block_size, chunk_size) = default_layout();
    let mut group = c.benchmark_group("block_ranges/request_size");

    for length in [1u64, 4096, block_size.bytes() as u64, chunk_size.bytes() as u64 * 3] {
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter(|| {
                let count = block_ranges(black_box(0), black_box(length), block_size, chunk_size).count();
                black_box(count)
            });
        });
    }
    group.finish();
}

fn benchmark_chunk_boundary_crossing(c: &mut Criterion) {
    let (block_size, chunk_size) = default_layout();
    let chunk_bytes = chunk_size.bytes() as u64;
    let mut group = c.benchmark_group("block_ranges/chunk_boundary");

    let offsets = [
        ("mid_chunk", chunk_bytes / 2),
        ("at_boundary", chunk_bytes - 10),
        ("well_past_boundary", chunk_bytes + 10),
    ];
    for (label, offset) in offsets {
        group.bench_with_input(BenchmarkId::from_parameter(label), &offset, |b, &offset| {
            b.iter(|| {
                let ranges: Vec<_> = block_ranges(black_box(offset), black_box(4096), block_size, chunk_size).collect();
                black_box(ranges)
            });
        });
    }
    group.finish();
}

fn benchmark_small_block_layout(c: &mut Criterion) {
    let block_size = BlockSize::new(4096).unwrap();
    let chunk_size = ChunkSize::new(1024 * 1024, block_size).unwrap();
    let mut group = c.benchmark_group("block_ranges/small_block_layout");

    for length in [4096u64, 256 * 1024, 4 * 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, &length| {
            b.iter(|| {
                let count = block_ranges(black_box(0), black_box(length), block_size, chunk_size).count();
                black_box(count)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_block_ranges, benchmark_chunk_boundary_crossing, benchmark_small_block_layout);
criterion_main!(benches);
