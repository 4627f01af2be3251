// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process-wide `tracing` initialization.
//!
//! `RUST_LOG` drives the filter when set; otherwise `verbose` selects
//! between `info` and `debug` for the `dittofs_payload` target tree.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Must be called at most once per
/// process; a second call is a no-op (the underlying `set_global_default`
/// error is swallowed, matching the teacher's tolerance for double-init in
/// tests).
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
