//! PathSender / PathReceiver - one isolated queue per downstream consumer

use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use contracts::{OverflowPolicy, PathConfig, Sample};
use tracing::{debug, trace};

use crate::metrics::PathMetrics;

/// Downstream path identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// Live broadcast to subscribers
    Broadcast,
    /// Batched durable persistence
    Persistence,
}

impl PathKind {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handing one sample to one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued
    Enqueued,
    /// Queued after evicting `evicted` older samples
    Evicted { evicted: u64 },
    /// Queue full, incoming sample dropped
    Dropped,
    /// Consumer gone
    Closed,
}

impl SendOutcome {
    /// The sample is now in the queue
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Enqueued | Self::Evicted { .. })
    }
}

/// Create one path with the given configuration
pub fn path(kind: PathKind, config: PathConfig) -> (PathSender, PathReceiver) {
    let (tx, rx) = match config.overflow {
        OverflowPolicy::Unbounded => async_channel::unbounded(),
        _ => async_channel::bounded(config.capacity.max(1)),
    };
    let metrics = Arc::new(PathMetrics::new(kind));
    let evict_rx = (config.overflow == OverflowPolicy::DropOldest).then(|| Arc::new(rx.clone()));

    let sender = PathSender {
        kind,
        policy: config.overflow,
        tx,
        evict_rx,
        metrics: Arc::clone(&metrics),
    };
    let receiver = PathReceiver { kind, rx, metrics };
    (sender, receiver)
}

/// Producer side of a path
#[derive(Clone)]
pub struct PathSender {
    kind: PathKind,
    policy: OverflowPolicy,
    tx: Sender<Sample>,
    /// Receiver clone used only to evict the oldest entry (drop_oldest),
    /// shared by every sender clone
    evict_rx: Option<Arc<Receiver<Sample>>>,
    metrics: Arc<PathMetrics>,
}

impl PathSender {
    /// Path identity
    pub fn kind(&self) -> PathKind {
        self.kind
    }

    /// Overflow policy of this path
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<PathMetrics> {
        &self.metrics
    }

    /// Hand one sample to the path according to its overflow policy.
    ///
    /// Only `block` can wait; every other policy returns immediately.
    pub async fn send(&self, sample: Sample) -> SendOutcome {
        let outcome = match self.policy {
            OverflowPolicy::Block => match self.tx.send(sample).await {
                Ok(()) => SendOutcome::Enqueued,
                Err(_) => SendOutcome::Closed,
            },
            OverflowPolicy::DropOldest => self.send_evicting(sample),
            OverflowPolicy::DropNewest | OverflowPolicy::Unbounded => {
                match self.tx.try_send(sample) {
                    Ok(()) => SendOutcome::Enqueued,
                    Err(TrySendError::Full(_)) => SendOutcome::Dropped,
                    Err(TrySendError::Closed(_)) => SendOutcome::Closed,
                }
            }
        };
        self.record(outcome, &sample);
        outcome
    }

    fn send_evicting(&self, mut sample: Sample) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }
        let mut evicted = 0u64;
        loop {
            match self.tx.try_send(sample) {
                Ok(()) if evicted == 0 => return SendOutcome::Enqueued,
                Ok(()) => return SendOutcome::Evicted { evicted },
                Err(TrySendError::Closed(_)) => return SendOutcome::Closed,
                Err(TrySendError::Full(returned)) => {
                    sample = returned;
                    if let Some(rx) = &self.evict_rx {
                        match rx.try_recv() {
                            Ok(_) => {
                                evicted += 1;
                                self.metrics.inc_evicted();
                            }
                            // The consumer emptied the slot first.
                            Err(TryRecvError::Empty) => {}
                            Err(TryRecvError::Closed) => return SendOutcome::Closed,
                        }
                    }
                }
            }
        }
    }

    fn record(&self, outcome: SendOutcome, sample: &Sample) {
        match outcome {
            SendOutcome::Enqueued | SendOutcome::Evicted { .. } => {
                self.metrics.inc_enqueued();
                self.metrics.set_queue_len(self.tx.len());
                trace!(path = %self.kind, timestamp = sample.timestamp, "sample enqueued");
            }
            SendOutcome::Dropped => {
                self.metrics.inc_dropped();
                debug!(path = %self.kind, timestamp = sample.timestamp, "queue full, sample dropped");
            }
            SendOutcome::Closed => {
                self.metrics.inc_closed();
                trace!(path = %self.kind, "path closed, sample discarded");
            }
        }
    }

    /// Whether the consumer side is gone.
    ///
    /// A drop_oldest path holds its own eviction receiver, so only the
    /// consumer's receiver counts.
    pub fn is_closed(&self) -> bool {
        let own = usize::from(self.evict_rx.is_some());
        self.tx.is_closed() || self.tx.receiver_count() <= own
    }
}

/// Consumer side of a path
pub struct PathReceiver {
    kind: PathKind,
    rx: Receiver<Sample>,
    metrics: Arc<PathMetrics>,
}

impl PathReceiver {
    /// Path identity
    pub fn kind(&self) -> PathKind {
        self.kind
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<PathMetrics> {
        &self.metrics
    }

    /// Wait for the next sample.
    ///
    /// Returns `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&self) -> Option<Sample> {
        let sample = self.rx.recv().await.ok()?;
        self.metrics.set_queue_len(self.rx.len());
        Some(sample)
    }

    /// Take a sample without waiting
    pub fn try_recv(&self) -> Option<Sample> {
        let sample = self.rx.try_recv().ok()?;
        self.metrics.set_queue_len(self.rx.len());
        Some(sample)
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Stop accepting new samples; queued ones can still be received
    pub fn close(&self) -> bool {
        self.rx.close()
    }
}
