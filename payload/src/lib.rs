// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure and application layer for the DittoFS payload data plane.
//!
//! This crate implements the ports declared in `dittofs_payload_domain`:
//! an mmap-backed [`cache`], `BlockStore` backends under [`blockstore`], a
//! sqlite-backed dedup catalog under [`objectstore`], the upload/download
//! orchestration and bounded transfer queue in [`offloader`], [`metrics`],
//! [`config`] loading, [`logging`] setup, and the [`payload_service`]
//! facade that composes them all.

pub mod blockstore;
pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod objectstore;
pub mod offloader;
pub mod payload_service;

pub use payload_service::PayloadService;
