// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus metrics for the Offloader and transfer queue.

use std::sync::Arc;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::RecoveryStats;

/// Registers and updates the metric set named in the external interface
/// list: transfer queue depth/outcomes, Offloader throughput and dedup
/// rate, and recovery stats.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    transfer_queue_pending: IntGauge,
    transfer_queue_completed_total: IntCounter,
    transfer_queue_failed_total: IntCounter,

    offloader_uploads_in_flight: IntGauge,
    offloader_dedup_hits_total: IntCounter,
    offloader_bytes_uploaded_total: IntCounter,
    offloader_bytes_downloaded_total: IntCounter,

    offloader_recovery_blocks_uploaded_total: IntCounter,
    offloader_recovery_blocks_failed_total: IntCounter,
    offloader_recovery_duration_seconds: Histogram,
}

fn metric_err(name: &str, e: impl std::fmt::Display) -> PayloadError {
    PayloadError::internal(format!("failed to register metric {name}: {e}"))
}

impl MetricsService {
    pub fn new() -> PayloadResult<Self> {
        let registry = Registry::new();
        let ns = "dittofs_payload";

        let transfer_queue_pending = IntGauge::with_opts(
            Opts::new("transfer_queue_pending", "Tasks currently queued or running").namespace(ns),
        )
        .map_err(|e| metric_err("transfer_queue_pending", e))?;
        let transfer_queue_completed_total = IntCounter::with_opts(
            Opts::new("transfer_queue_completed_total", "Tasks that completed successfully").namespace(ns),
        )
        .map_err(|e| metric_err("transfer_queue_completed_total", e))?;
        let transfer_queue_failed_total = IntCounter::with_opts(
            Opts::new("transfer_queue_failed_total", "Tasks whose upload attempt failed").namespace(ns),
        )
        .map_err(|e| metric_err("transfer_queue_failed_total", e))?;

        let offloader_uploads_in_flight = IntGauge::with_opts(
            Opts::new("offloader_uploads_in_flight", "Uploads currently holding the upload semaphore").namespace(ns),
        )
        .map_err(|e| metric_err("offloader_uploads_in_flight", e))?;
        let offloader_dedup_hits_total = IntCounter::with_opts(
            Opts::new("offloader_dedup_hits_total", "Blocks whose content hash already existed in the object store")
                .namespace(ns),
        )
        .map_err(|e| metric_err("offloader_dedup_hits_total", e))?;
        let offloader_bytes_uploaded_total = IntCounter::with_opts(
            Opts::new("offloader_bytes_uploaded_total", "Bytes written to the block store").namespace(ns),
        )
        .map_err(|e| metric_err("offloader_bytes_uploaded_total", e))?;
        let offloader_bytes_downloaded_total = IntCounter::with_opts(
            Opts::new("offloader_bytes_downloaded_total", "Bytes read from the block store").namespace(ns),
        )
        .map_err(|e| metric_err("offloader_bytes_downloaded_total", e))?;

        let offloader_recovery_blocks_uploaded_total = IntCounter::with_opts(
            Opts::new("offloader_recovery_blocks_uploaded_total", "Dirty blocks re-uploaded during startup recovery")
                .namespace(ns),
        )
        .map_err(|e| metric_err("offloader_recovery_blocks_uploaded_total", e))?;
        let offloader_recovery_blocks_failed_total = IntCounter::with_opts(
            Opts::new("offloader_recovery_blocks_failed_total", "Blocks that failed to re-upload during recovery")
                .namespace(ns),
        )
        .map_err(|e| metric_err("offloader_recovery_blocks_failed_total", e))?;
        let offloader_recovery_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("offloader_recovery_duration_seconds", "Time spent in startup recovery")
                .namespace(ns)
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )
        .map_err(|e| metric_err("offloader_recovery_duration_seconds", e))?;

        macro_rules! register {
            ($($metric:expr),+ $(,)?) => {
                $(registry.register(Box::new($metric.clone())).map_err(|e| metric_err(stringify!($metric), e))?;)+
            };
        }
        register!(
            transfer_queue_pending,
            transfer_queue_completed_total,
            transfer_queue_failed_total,
            offloader_uploads_in_flight,
            offloader_dedup_hits_total,
            offloader_bytes_uploaded_total,
            offloader_bytes_downloaded_total,
            offloader_recovery_blocks_uploaded_total,
            offloader_recovery_blocks_failed_total,
            offloader_recovery_duration_seconds,
        );

        Ok(Self {
            registry: Arc::new(registry),
            transfer_queue_pending,
            transfer_queue_completed_total,
            transfer_queue_failed_total,
            offloader_uploads_in_flight,
            offloader_dedup_hits_total,
            offloader_bytes_uploaded_total,
            offloader_bytes_downloaded_total,
            offloader_recovery_blocks_uploaded_total,
            offloader_recovery_blocks_failed_total,
            offloader_recovery_duration_seconds,
        })
    }

    /// Samples the transfer queue's counters, which are themselves
    /// monotonic `u64`s owned by the queue; this just mirrors them into
    /// gauges/counters Prometheus can scrape.
    pub fn observe_queue(&self, pending: u64, completed_delta: u64, failed_delta: u64) {
        self.transfer_queue_pending.set(pending as i64);
        if completed_delta > 0 {
            self.transfer_queue_completed_total.inc_by(completed_delta);
        }
        if failed_delta > 0 {
            self.transfer_queue_failed_total.inc_by(failed_delta);
        }
    }

    pub fn set_uploads_in_flight(&self, n: usize) {
        self.offloader_uploads_in_flight.set(n as i64);
    }

    pub fn record_dedup_hit(&self) {
        self.offloader_dedup_hits_total.inc();
    }

    pub fn add_bytes_uploaded(&self, bytes: u64) {
        self.offloader_bytes_uploaded_total.inc_by(bytes);
    }

    pub fn add_bytes_downloaded(&self, bytes: u64) {
        self.offloader_bytes_downloaded_total.inc_by(bytes);
    }

    pub fn record_recovery(&self, stats: &RecoveryStats, duration: std::time::Duration) {
        self.offloader_recovery_blocks_uploaded_total.inc_by(stats.blocks_uploaded);
        self.offloader_recovery_blocks_failed_total.inc_by(stats.blocks_failed);
        self.offloader_recovery_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn render(&self) -> PayloadResult<String> {
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode_to_string(&families).map_err(|e| PayloadError::internal(format!("encoding metrics: {e}")))
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new().expect("metric registration with fixed, non-conflicting names cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metric_names() {
        let svc = MetricsService::new().unwrap();
        svc.add_bytes_uploaded(4096);
        svc.record_dedup_hit();
        let text = svc.render().unwrap();
        assert!(text.contains("dittofs_payload_offloader_bytes_uploaded_total"));
        assert!(text.contains("dittofs_payload_offloader_dedup_hits_total"));
    }

    #[test]
    fn recovery_stats_feed_counters_and_histogram() {
        let svc = MetricsService::new().unwrap();
        let stats = RecoveryStats { files_scanned: 2, blocks_found: 5, blocks_uploaded: 4, blocks_failed: 1, bytes_uploaded: 0 };
        svc.record_recovery(&stats, std::time::Duration::from_millis(250));
        let text = svc.render().unwrap();
        assert!(text.contains("dittofs_payload_offloader_recovery_duration_seconds"));
    }
}
