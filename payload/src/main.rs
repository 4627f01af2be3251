// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # `dittofs-payload-demo`
//!
//! Demo scaffolding for the payload data plane: a small CLI that exercises
//! `PayloadService` end to end. Not a protocol server — no NFS/SMB or
//! HTTP control-plane surface lives here, only the `/metrics` + `/health`
//! scrape endpoint the `serve` subcommand starts alongside it.
//!
//! ## Backend selection
//!
//! The block store and object catalog backends are chosen from environment
//! variables rather than `PayloadServiceConfig`, since which backend to run
//! against is a deployment concern the domain config intentionally stays
//! silent on:
//!
//! - `DITTOFS_BLOCKSTORE_DIR`: if set, blocks are persisted under this
//!   directory via `FilesystemBlockStore`. If unset, an in-memory block
//!   store is used (data does not survive the process).
//! - `DITTOFS_CATALOG_DB`: sqlite connection string for the dedup catalog
//!   (e.g. `sqlite://catalog.db`). If unset, an in-memory catalog is used.

use std::sync::Arc;
use std::time::Duration;

use dittofs_payload_bootstrap::shutdown::ShutdownCoordinator;
use dittofs_payload_bootstrap::signals::create_signal_handler;
use dittofs_payload_bootstrap::{bootstrap_cli, result_to_exit_code, ValidatedCommand};

use dittofs_payload::blockstore::{FilesystemBlockStore, InMemoryBlockStore};
use dittofs_payload::cache::MmapCache;
use dittofs_payload::config::ConfigService;
use dittofs_payload::metrics::{MetricsEndpoint, MetricsService};
use dittofs_payload::objectstore::{InMemoryObjectStore, SqliteObjectStore};
use dittofs_payload::offloader::Offloader;
use dittofs_payload::{logging, PayloadService};

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::{BlockStore, BlockUploader, Cache, ChecksumService, FinalizationCallback, ObjectStore, Sha256ChecksumService};
use dittofs_payload_domain::value_objects::{BlockRef, PayloadId};

/// Logs finalized generations at info level; the demo binary has no
/// metadata layer of its own to hand block refs off to.
struct LoggingFinalization;

impl FinalizationCallback for LoggingFinalization {
    fn on_finalized(&self, payload_id: &PayloadId, block_refs: Vec<BlockRef>) {
        tracing::info!(payload_id = %payload_id, block_count = block_refs.len(), "payload finalized");
    }
}

async fn build_block_store() -> PayloadResult<Arc<dyn BlockStore>> {
    match std::env::var("DITTOFS_BLOCKSTORE_DIR") {
        Ok(dir) => Ok(Arc::new(FilesystemBlockStore::new(dir))),
        Err(_) => Ok(Arc::new(InMemoryBlockStore::new())),
    }
}

async fn build_object_store() -> PayloadResult<Arc<dyn ObjectStore>> {
    match std::env::var("DITTOFS_CATALOG_DB") {
        Ok(url) => Ok(Arc::new(SqliteObjectStore::open(&url).await?)),
        Err(_) => Ok(Arc::new(InMemoryObjectStore::new())),
    }
}

async fn build_service(config_path: Option<&std::path::Path>) -> PayloadResult<(Arc<PayloadService>, Arc<Offloader>)> {
    let service_config = ConfigService::load(config_path)?;

    let cache = Arc::new(MmapCache::open(
        &service_config.cache,
        service_config.block_layout.block_size.bytes(),
        service_config.block_layout.chunk_size.bytes() as u64,
    )?) as Arc<dyn Cache>;

    let block_store = build_block_store().await?;
    let object_store = build_object_store().await?;
    let checksum: Arc<dyn ChecksumService> = Arc::new(Sha256ChecksumService);

    let offloader = Offloader::new(
        block_store,
        object_store,
        cache.clone(),
        checksum,
        Arc::new(LoggingFinalization),
        service_config.block_layout,
        service_config.offloader,
    );

    let service = Arc::new(PayloadService::new(cache, offloader.clone(), service_config.block_layout));
    Ok((service, offloader))
}

async fn run_serve(config_path: Option<&std::path::Path>, metrics_port_override: Option<u16>) -> PayloadResult<()> {
    // `service` is built for parity with a real deployment's startup path;
    // this demo has no protocol front-end to route read/write calls
    // through it yet.
    let (_service, offloader) = build_service(config_path).await?;

    let stats = offloader.recover().await?;
    tracing::info!(
        files_scanned = stats.files_scanned,
        blocks_uploaded = stats.blocks_uploaded,
        blocks_failed = stats.blocks_failed,
        "startup recovery complete"
    );

    let metrics_service = Arc::new(MetricsService::new()?);
    let metrics_port = match metrics_port_override {
        Some(port) => port,
        None => ConfigService::metrics_port(config_path)?,
    };
    let endpoint = MetricsEndpoint::new(metrics_service);
    tokio::spawn(async move {
        if let Err(e) = endpoint.start(metrics_port).await {
            tracing::error!("metrics endpoint stopped: {e}");
        }
    });

    let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(10)));
    let token = coordinator.token();
    let handler = create_signal_handler();
    let coordinator_for_signal = coordinator.clone();
    tokio::spawn(async move {
        handler.wait_for_signal(Box::new(move || coordinator_for_signal.initiate_shutdown())).await;
    });

    token.cancelled().await;
    tracing::info!("shutdown signal received, draining Offloader");
    offloader.close(10_000).await?;
    coordinator.complete_shutdown();
    Ok(())
}

async fn run_health(config_path: Option<&std::path::Path>) -> PayloadResult<()> {
    let (_, offloader) = build_service(config_path).await?;
    match offloader.healthcheck().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("UNHEALTHY: {e}");
            Err(e)
        }
    }
}

async fn run_recover(config_path: Option<&std::path::Path>, cache_dir: std::path::PathBuf) -> PayloadResult<()> {
    std::env::set_var("DITTOFS_BLOCKSTORE_DIR", cache_dir.join("blocks"));

    let (_, offloader) = build_service(config_path).await?;
    let stats = offloader.recover().await?;

    println!("files_scanned:   {}", stats.files_scanned);
    println!("blocks_found:    {}", stats.blocks_found);
    println!("blocks_uploaded: {}", stats.blocks_uploaded);
    println!("blocks_failed:   {}", stats.blocks_failed);
    println!("bytes_uploaded:  {}", stats.bytes_uploaded);

    if stats.blocks_failed > 0 {
        return Err(PayloadError::internal(format!("{} blocks failed to recover", stats.blocks_failed)));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match bootstrap_cli() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    logging::init(cli.verbose);
    let config_path = cli.config.as_deref();

    let outcome = match cli.command {
        ValidatedCommand::Serve { metrics_port } => run_serve(config_path, metrics_port).await,
        ValidatedCommand::Health => run_health(config_path).await,
        ValidatedCommand::Recover { cache_dir } => run_recover(config_path, cache_dir).await,
    };

    result_to_exit_code(outcome)
}
