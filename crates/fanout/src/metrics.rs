//! Per-path metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::PathKind;

/// Metrics for a single fan-out path
#[derive(Debug)]
pub struct PathMetrics {
    path: PathKind,
    /// Samples accepted into the queue
    enqueued: AtomicU64,
    /// Incoming samples dropped because the queue was full
    dropped: AtomicU64,
    /// Queued samples evicted to make room (drop_oldest)
    evicted: AtomicU64,
    /// Publishes that found the path closed
    closed: AtomicU64,
    /// Current queue length
    queue_len: AtomicUsize,
}

impl PathMetrics {
    /// Create new metrics instance
    pub fn new(path: PathKind) -> Self {
        Self {
            path,
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            queue_len: AtomicUsize::new(0),
        }
    }

    /// Path these metrics belong to
    pub fn path(&self) -> PathKind {
        self.path
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_path_dropped_total", "path" => self.path.as_str(), "reason" => "full")
            .increment(1);
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gyro_relay_path_dropped_total", "path" => self.path.as_str(), "reason" => "evicted")
            .increment(1);
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn inc_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("gyro_relay_path_queue_len", "path" => self.path.as_str()).set(len as f64);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PathSnapshot {
        PathSnapshot {
            enqueued: self.enqueued(),
            dropped: self.dropped(),
            evicted: self.evicted(),
            closed: self.closed(),
            queue_len: self.queue_len(),
        }
    }
}

/// Snapshot of path metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub evicted: u64,
    pub closed: u64,
    pub queue_len: usize,
}

impl PathSnapshot {
    /// Samples that never reached (or were removed from) the queue
    pub fn lost(&self) -> u64 {
        self.dropped + self.evicted + self.closed
    }
}
