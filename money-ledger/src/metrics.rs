//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_transfers_total{outcome}` - Transfers by outcome (`completed` or an error kind)
//! - `ledger_transfer_duration_seconds` - Histogram of transfer latencies
//! - `ledger_transfer_conflict_retries_total` - Units retried after a lock timeout or conflict
//! - `ledger_failed_records_total` - `failed` audit records written

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Transfers by outcome
    pub transfers_total: IntCounterVec,

    /// Transfer duration histogram
    pub transfer_duration: Histogram,

    /// Conflict retries
    pub conflict_retries: IntCounter,

    /// Failed audit records written
    pub failed_records: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounterVec::new(
            Opts::new("ledger_transfers_total", "Transfers by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(transfers_total.clone()))?;

        let transfer_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_transfer_duration_seconds",
                "Histogram of transfer latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(transfer_duration.clone()))?;

        let conflict_retries = IntCounter::new(
            "ledger_transfer_conflict_retries_total",
            "Units retried after a lock timeout or write conflict",
        )?;
        registry.register(Box::new(conflict_retries.clone()))?;

        let failed_records = IntCounter::new(
            "ledger_failed_records_total",
            "Failed audit records written",
        )?;
        registry.register(Box::new(failed_records.clone()))?;

        Ok(Self {
            transfers_total,
            transfer_duration,
            conflict_retries,
            failed_records,
            registry,
        })
    }

    /// Record a finished transfer
    pub fn record_transfer(&self, outcome: &str, duration_seconds: f64) {
        self.transfers_total.with_label_values(&[outcome]).inc();
        self.transfer_duration.observe(duration_seconds);
    }

    /// Record a retried unit
    pub fn record_conflict_retry(&self) {
        self.conflict_retries.inc();
    }

    /// Record a `failed` audit record
    pub fn record_failed_record(&self) {
        self.failed_records.inc();
    }

    /// Transfers counted under `outcome`
    pub fn transfers_with_outcome(&self, outcome: &str) -> u64 {
        self.transfers_total.with_label_values(&[outcome]).get()
    }

    /// Render in the Prometheus text exposition format
    pub fn export(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transfers_with_outcome("completed"), 0);
        assert_eq!(metrics.conflict_retries.get(), 0);

        // Independent registries, no global name clash
        let again = Metrics::new().unwrap();
        assert_eq!(again.failed_records.get(), 0);
    }

    #[test]
    fn test_record_transfer() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transfer("completed", 0.002);
        metrics.record_transfer("completed", 0.004);
        metrics.record_transfer("FAILED_PRECONDITION", 0.001);

        assert_eq!(metrics.transfers_with_outcome("completed"), 2);
        assert_eq!(metrics.transfers_with_outcome("FAILED_PRECONDITION"), 1);
        assert_eq!(metrics.transfer_duration.get_sample_count(), 3);
    }

    #[test]
    fn test_export_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict_retry();
        metrics.record_transfer("completed", 0.01);

        let text = metrics.export().unwrap();
        assert!(text.contains("ledger_transfer_conflict_retries_total 1"));
        assert!(text.contains("ledger_transfers_total{outcome=\"completed\"} 1"));
    }
}
