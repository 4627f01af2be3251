// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Loads [`PayloadServiceConfig`] from an optional TOML file overlaid with
//! `DITTOFS_*` environment variables, validating once at the edge the way
//! the domain's config value objects expect.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use dittofs_payload_domain::config::{BlockLayoutConfig, CacheConfig, OffloaderConfig, PayloadServiceConfig, TransferQueueConfig};
use dittofs_payload_domain::error::{PayloadError, PayloadResult};

#[derive(Debug, Deserialize, Default)]
struct RawCache {
    capacity_bytes: Option<u64>,
    backing_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RawOffloader {
    parallel_uploads: Option<usize>,
    parallel_downloads: Option<usize>,
    small_file_threshold_bytes: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTransferQueue {
    size: Option<usize>,
    workers: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawBlock {
    size_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawChunk {
    size_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMetrics {
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    cache: RawCache,
    #[serde(default)]
    offloader: RawOffloader,
    #[serde(default)]
    transfer_queue: RawTransferQueue,
    #[serde(default)]
    block: RawBlock,
    #[serde(default)]
    chunk: RawChunk,
    #[serde(default)]
    metrics: RawMetrics,
}

const DEFAULT_BLOCK_SIZE_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_CHUNK_SIZE_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Loads and validates the payload service's configuration.
///
/// `path`, if present, is read as TOML. Every key is then overridable by an
/// environment variable of the form `DITTOFS_<SECTION>__<KEY>` (e.g.
/// `DITTOFS_CACHE__CAPACITY_BYTES`), following the teacher's
/// config-file-then-env precedence.
pub struct ConfigService;

impl ConfigService {
    pub fn load(path: Option<&Path>) -> PayloadResult<PayloadServiceConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("DITTOFS").separator("__"));

        let settings: RawSettings = builder
            .build()
            .map_err(|e| PayloadError::config(format!("loading configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| PayloadError::config(format!("parsing configuration: {e}")))?;

        Self::build(settings)
    }

    /// Builds a config purely from defaults, used by `dittofs-payload-demo`
    /// when no config file is given and no environment overrides are set.
    pub fn defaults() -> PayloadResult<PayloadServiceConfig> {
        Self::build(RawSettings::default())
    }

    /// Reads `metrics.port`, independent of `PayloadServiceConfig` since the
    /// metrics endpoint is a bootstrap-level concern, not a domain one.
    pub fn metrics_port(path: Option<&Path>) -> PayloadResult<u16> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("DITTOFS").separator("__"));
        let settings: RawSettings = builder
            .build()
            .map_err(|e| PayloadError::config(format!("loading configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| PayloadError::config(format!("parsing configuration: {e}")))?;
        Ok(settings.metrics.port.unwrap_or(DEFAULT_METRICS_PORT))
    }

    fn build(settings: RawSettings) -> PayloadResult<PayloadServiceConfig> {
        let cache = CacheConfig {
            capacity_bytes: settings
                .cache
                .capacity_bytes
                .ok_or_else(|| PayloadError::config("cache.capacity_bytes is required"))?,
            backing_file: settings.cache.backing_file,
        };

        let defaults = OffloaderConfig::default();
        let offloader = OffloaderConfig {
            parallel_uploads: settings.offloader.parallel_uploads.unwrap_or(defaults.parallel_uploads),
            parallel_downloads: settings.offloader.parallel_downloads.unwrap_or(defaults.parallel_downloads),
            small_file_threshold_bytes: settings
                .offloader
                .small_file_threshold_bytes
                .unwrap_or(defaults.small_file_threshold_bytes),
            shutdown_timeout_ms: settings.offloader.shutdown_timeout_ms.unwrap_or(defaults.shutdown_timeout_ms),
        };

        let tq_defaults = TransferQueueConfig::default();
        let transfer_queue = TransferQueueConfig {
            size: settings.transfer_queue.size.unwrap_or(tq_defaults.size),
            workers: settings.transfer_queue.workers.unwrap_or(tq_defaults.workers),
        };

        let block_layout = BlockLayoutConfig::new(
            settings.block.size_bytes.unwrap_or(DEFAULT_BLOCK_SIZE_BYTES),
            settings.chunk.size_bytes.unwrap_or(DEFAULT_CHUNK_SIZE_BYTES),
        )?;

        PayloadServiceConfig::new(cache, offloader, transfer_queue, block_layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_require_explicit_cache_capacity() {
        let err = ConfigService::defaults().unwrap_err();
        assert!(matches!(err, PayloadError::Config(_)));
    }

    #[test]
    fn loads_well_formed_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [cache]
            capacity_bytes = 67108864

            [offloader]
            parallel_uploads = 8
            "#
        )
        .unwrap();

        let config = ConfigService::load(Some(file.path())).unwrap();
        assert_eq!(config.cache.capacity_bytes, 67_108_864);
        assert_eq!(config.offloader.parallel_uploads, 8);
        assert_eq!(config.offloader.parallel_downloads, 4);
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cache]\ncapacity_bytes = 1048576").unwrap();

        std::env::set_var("DITTOFS_CACHE__CAPACITY_BYTES", "2097152");
        let config = ConfigService::load(Some(file.path())).unwrap();
        std::env::remove_var("DITTOFS_CACHE__CAPACITY_BYTES");

        assert_eq!(config.cache.capacity_bytes, 2_097_152);
    }
}
