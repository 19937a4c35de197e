//! BroadcastService - drains the broadcast path and fans each sample out

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{BroadcastConfig, BroadcastMessage, Sample};
use fanout::PathReceiver;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::BroadcastError;
use crate::registry::SubscriberRegistry;
use crate::subscriber::Subscriber;

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Send attempts (one per snapshot member)
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// No subscriber was registered
    pub discarded: bool,
}

/// Running broadcast counters
#[derive(Debug, Default)]
pub struct BroadcastStats {
    samples: AtomicU64,
    discarded: AtomicU64,
    sends_ok: AtomicU64,
    sends_failed: AtomicU64,
}

impl BroadcastStats {
    fn record(&self, report: &FanoutReport) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if report.discarded {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        self.sends_ok
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.sends_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BroadcastReport {
        BroadcastReport {
            samples: self.samples.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            sends_ok: self.sends_ok.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
        }
    }
}

/// Totals of a broadcast run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Samples taken from the queue
    pub samples: u64,
    /// Samples discarded for lack of subscribers
    pub discarded: u64,
    pub sends_ok: u64,
    /// Failed or timed-out sends (each removed its subscriber)
    pub sends_failed: u64,
}

/// Live broadcast of samples to every registered subscriber
#[derive(Clone)]
pub struct BroadcastService {
    registry: SubscriberRegistry,
    send_timeout: Option<Duration>,
    stats: Arc<BroadcastStats>,
}

impl BroadcastService {
    /// `send_timeout` of `None` waits for every send indefinitely
    pub fn new(registry: SubscriberRegistry, send_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            send_timeout,
            stats: Arc::new(BroadcastStats::default()),
        }
    }

    /// Build from configuration (`send_timeout_ms = 0` disables the timeout)
    pub fn from_config(registry: SubscriberRegistry, config: &BroadcastConfig) -> Self {
        let timeout = (config.send_timeout_ms > 0).then(|| Duration::from_millis(config.send_timeout_ms));
        Self::new(registry, timeout)
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<BroadcastStats> {
        &self.stats
    }

    /// Send one sample to every current subscriber.
    ///
    /// Sends run concurrently and the call returns once all of them completed,
    /// failed or timed out. Each failed subscriber is unregistered and closed.
    pub async fn fan_out(&self, sample: &Sample) -> FanoutReport {
        let subscribers = self.registry.snapshot();
        if subscribers.is_empty() {
            trace!(timestamp = sample.timestamp, "no subscribers, sample discarded");
            let report = FanoutReport {
                discarded: true,
                ..Default::default()
            };
            self.stats.record(&report);
            return report;
        }

        let text = match BroadcastMessage::from(sample).to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to encode broadcast message");
                return FanoutReport::default();
            }
        };

        let results = join_all(subscribers.iter().map(|(id, subscriber)| {
            let text = text.as_str();
            async move {
                let result = match self.send_timeout {
                    Some(limit) => match tokio::time::timeout(limit, subscriber.send(text)).await {
                        Ok(result) => result,
                        Err(_) => Err(BroadcastError::SendTimeout {
                            peer: subscriber.peer().to_string(),
                            timeout_ms: limit.as_millis() as u64,
                        }),
                    },
                    None => subscriber.send(text).await,
                };
                (*id, subscriber, result)
            }
        }))
        .await;

        let mut report = FanoutReport {
            attempted: results.len(),
            ..Default::default()
        };
        let mut failed = Vec::new();
        for (id, subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(subscriber = %id, peer = subscriber.peer(), error = %e, "broadcast send failed, removing subscriber");
                    if self.registry.unregister(id) {
                        failed.push(subscriber);
                    }
                }
            }
        }
        join_all(failed.iter().map(|s| self.close_bounded(s.as_ref()))).await;

        metrics::counter!("gyro_relay_broadcast_sends_total", "status" => "ok")
            .increment(report.delivered as u64);
        metrics::counter!("gyro_relay_broadcast_sends_total", "status" => "failed")
            .increment(report.failed as u64);
        self.stats.record(&report);
        report
    }

    async fn close_bounded(&self, subscriber: &dyn Subscriber) {
        match self.send_timeout {
            Some(limit) => {
                let _ = tokio::time::timeout(limit, subscriber.close()).await;
            }
            None => subscriber.close().await,
        }
    }

    /// Drain loop: wait for samples and fan each one out.
    ///
    /// Stops on the shutdown signal or when the path closes. A fan-out that has
    /// started always completes first.
    #[instrument(name = "broadcast_run", skip_all)]
    pub async fn run(self, rx: PathReceiver, mut shutdown: watch::Receiver<bool>) -> BroadcastReport {
        info!("broadcast drain loop started");

        loop {
            if *shutdown.borrow_and_update() {
                debug!("shutdown signalled");
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
                sample = rx.recv() => match sample {
                    Some(sample) => {
                        self.fan_out(&sample).await;
                    }
                    None => {
                        debug!("broadcast path closed");
                        break;
                    }
                }
            }
        }

        let report = self.stats.snapshot();
        info!(
            samples = report.samples,
            discarded = report.discarded,
            sends_ok = report.sends_ok,
            sends_failed = report.sends_failed,
            "broadcast drain loop stopped"
        );
        report
    }
}
