//! FanoutRouter - one producer call, two isolated queues

use std::sync::Arc;

use contracts::{FanoutConfig, Sample};
use tracing::{debug, info, instrument};

use crate::error::FanoutError;
use crate::metrics::{PathMetrics, PathSnapshot};
use crate::path::{path, PathKind, PathReceiver, PathSender, SendOutcome};

/// Outcome of publishing one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub broadcast: SendOutcome,
    pub persistence: SendOutcome,
}

impl PublishOutcome {
    /// Neither path can receive samples any more
    pub fn all_closed(&self) -> bool {
        self.broadcast == SendOutcome::Closed && self.persistence == SendOutcome::Closed
    }
}

/// Hands every parsed sample to the broadcast and persistence paths.
///
/// Cloning yields another producer handle; the paths close once every clone
/// is dropped.
#[derive(Clone)]
pub struct FanoutRouter {
    broadcast: PathSender,
    persistence: PathSender,
}

impl FanoutRouter {
    /// Build the router and the two consumer ends (broadcast, persistence)
    #[instrument(name = "fanout_router_new", skip(config))]
    pub fn new(config: FanoutConfig) -> (Self, PathReceiver, PathReceiver) {
        let (broadcast, broadcast_rx) = path(PathKind::Broadcast, config.broadcast);
        let (persistence, persistence_rx) = path(PathKind::Persistence, config.persistence);

        info!(
            broadcast_capacity = config.broadcast.capacity,
            broadcast_overflow = ?config.broadcast.overflow,
            persistence_capacity = config.persistence.capacity,
            persistence_overflow = ?config.persistence.overflow,
            "fan-out router created"
        );

        (
            Self {
                broadcast,
                persistence,
            },
            broadcast_rx,
            persistence_rx,
        )
    }

    /// Publish one sample to both paths.
    ///
    /// Broadcast goes first so a blocked persistence queue cannot hold back
    /// live delivery of the same sample.
    pub async fn publish(&self, sample: Sample) -> PublishOutcome {
        let broadcast = self.broadcast.send(sample).await;
        let persistence = self.persistence.send(sample).await;
        PublishOutcome {
            broadcast,
            persistence,
        }
    }

    /// Publish, failing once samples can no longer be stored.
    ///
    /// A closed broadcast path alone is not an error: live delivery is best
    /// effort, persistence is not.
    pub async fn publish_checked(&self, sample: Sample) -> Result<PublishOutcome, FanoutError> {
        let outcome = self.publish(sample).await;
        if outcome.all_closed() {
            debug!("all fan-out paths closed");
            return Err(FanoutError::AllPathsClosed);
        }
        if outcome.persistence == SendOutcome::Closed {
            debug!("persistence path closed");
            return Err(FanoutError::PathClosed {
                path: PathKind::Persistence,
            });
        }
        Ok(outcome)
    }

    /// Shared metrics of both paths
    pub fn metrics(&self) -> FanoutMetrics {
        FanoutMetrics {
            broadcast: Arc::clone(self.broadcast.metrics()),
            persistence: Arc::clone(self.persistence.metrics()),
        }
    }

    /// Error if the given path has no consumer
    pub fn ensure_open(&self, kind: PathKind) -> Result<(), FanoutError> {
        let sender = match kind {
            PathKind::Broadcast => &self.broadcast,
            PathKind::Persistence => &self.persistence,
        };
        if sender.is_closed() {
            return Err(FanoutError::PathClosed { path: kind });
        }
        Ok(())
    }
}

/// Metrics handles that outlive the router
#[derive(Debug, Clone)]
pub struct FanoutMetrics {
    pub broadcast: Arc<PathMetrics>,
    pub persistence: Arc<PathMetrics>,
}

impl FanoutMetrics {
    pub fn snapshot(&self) -> FanoutSnapshot {
        FanoutSnapshot {
            broadcast: self.broadcast.snapshot(),
            persistence: self.persistence.snapshot(),
        }
    }
}

/// Snapshot of both paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSnapshot {
    pub broadcast: PathSnapshot,
    pub persistence: PathSnapshot,
}
