//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
///
/// Shared between the reader and whoever reports on it (the supervisor keeps an
/// `Arc` so counters survive the reader being consumed).
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total bytes read from the transport
    pub bytes_received: AtomicU64,

    /// Complete non-blank lines framed
    pub lines_received: AtomicU64,

    /// Lines decoded into samples
    pub samples_parsed: AtomicU64,

    /// Lines rejected by the decoder
    pub lines_discarded: AtomicU64,

    /// Lines discarded for exceeding `max_line_bytes`
    pub oversize_discarded: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record bytes read
    pub fn record_bytes(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record a framed line
    pub fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_lines_received_total").increment(1);
    }

    /// Record a decoded sample
    pub fn record_parsed(&self) {
        self.samples_parsed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_samples_parsed_total").increment(1);
    }

    /// Record a decode failure
    pub fn record_discarded(&self) {
        self.lines_discarded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_lines_discarded_total", "reason" => "decode").increment(1);
    }

    /// Record an oversize line
    pub fn record_oversize(&self) {
        self.oversize_discarded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_lines_discarded_total", "reason" => "oversize").increment(1);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> IngestionSnapshot {
        IngestionSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            samples_parsed: self.samples_parsed.load(Ordering::Relaxed),
            lines_discarded: self.lines_discarded.load(Ordering::Relaxed),
            oversize_discarded: self.oversize_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSnapshot {
    pub bytes_received: u64,
    pub lines_received: u64,
    pub samples_parsed: u64,
    pub lines_discarded: u64,
    pub oversize_discarded: u64,
}
