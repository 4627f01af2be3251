// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain layer of the DittoFS payload data plane.
//!
//! This crate holds pure value objects, addressing math, and narrow port
//! traits. It depends on no async runtime: infrastructure crates implement
//! the ports defined here with `tokio`. Async-trait ports are still
//! declared here because they describe *what* I/O the domain needs, not
//! *how* it is performed.

pub mod addressing;
pub mod config;
pub mod error;
pub mod services;
pub mod value_objects;

pub use error::{PayloadError, PayloadResult};
